use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A chat message as persisted by the backend and delivered on the live topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    #[serde(alias = "matchId")]
    pub conversation_id: String,
    pub sender_id: String,
    #[serde(alias = "senderName")]
    pub sender_display_name: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Frontend,
    Backend,
    Fullstack,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Frontend => "FRONTEND",
            Role::Backend => "BACKEND",
            Role::Fullstack => "FULLSTACK",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "FRONTEND" => Ok(Role::Frontend),
            "BACKEND" => Ok(Role::Backend),
            "FULLSTACK" => Ok(Role::Fullstack),
            other => Err(format!("unknown role {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RoleRequest {
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueState {
    Idle,
    Waiting,
    Matched,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub state: QueueState,
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(default)]
    pub match_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub tech_stack: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partner {
    pub id: String,
    #[serde(alias = "name")]
    pub display_name: String,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: String,
    pub project: Project,
    pub partner: Partner,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub repository_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub status: ReviewStatus,
    #[serde(default)]
    pub score: Option<u32>,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn chat_message_accepts_backend_aliases() {
        let message: ChatMessage = serde_json::from_value(json!({
            "id": "42",
            "matchId": "m1",
            "senderId": "u7",
            "senderName": "Ada",
            "content": "hi",
            "createdAt": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(message.conversation_id, "m1");
        assert_eq!(message.sender_display_name, "Ada");
        assert_eq!(message.created_at, datetime!(2024-05-01 10:00:00 UTC));
    }

    #[test]
    fn chat_message_rejects_missing_timestamp() {
        let result = serde_json::from_value::<ChatMessage>(json!({
            "id": "42",
            "conversationId": "m1",
            "senderId": "u7",
            "senderDisplayName": "Ada",
            "content": "hi"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("frontend".parse::<Role>().unwrap(), Role::Frontend);
        assert_eq!(" FullStack ".parse::<Role>().unwrap(), Role::Fullstack);
        assert!("designer".parse::<Role>().is_err());
    }

    #[test]
    fn completion_request_omits_empty_notes() {
        let body = serde_json::to_value(CompletionRequest {
            repository_url: "https://github.com/ada/project".into(),
            notes: None,
        })
        .unwrap();
        assert_eq!(body, json!({ "repositoryUrl": "https://github.com/ada/project" }));
    }
}
