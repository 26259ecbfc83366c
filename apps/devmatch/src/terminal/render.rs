//! Plain-text rendering for the terminal front end.

use devmatch_api::{ChatMessage, Match, QueueState, QueueStatus, Review, ReviewStatus, User};
use time::macros::format_description;

use crate::session::{ChatView, SessionState};

pub fn message_line(message: &ChatMessage) -> String {
    let clock = message
        .created_at
        .format(format_description!("[hour]:[minute]"))
        .unwrap_or_else(|_| "--:--".to_string());
    format!(
        "[{clock}] {}: {}",
        message.sender_display_name, message.content
    )
}

pub fn user_line(user: &User) -> String {
    let role = user.role.map(|role| role.to_string()).unwrap_or_else(|| "no role".into());
    match &user.email {
        Some(email) => format!("{} <{email}> ({role})", user.display_name),
        None => format!("{} ({role})", user.display_name),
    }
}

pub fn queue_line(status: &QueueStatus) -> String {
    match (status.state, status.position, status.match_id.as_deref()) {
        (QueueState::Matched, _, Some(match_id)) => format!("matched: {match_id}"),
        (QueueState::Matched, _, None) => "matched".to_string(),
        (QueueState::Waiting, Some(position), _) => format!("waiting (position {position})"),
        (QueueState::Waiting, None, _) => "waiting".to_string(),
        (QueueState::Idle, _, _) => "not in queue".to_string(),
    }
}

pub fn match_lines(current: &Match) -> Vec<String> {
    let mut lines = vec![
        format!("match {}", current.id),
        format!("project: {}", current.project.title),
        format!("  {}", current.project.description),
    ];
    if !current.project.tech_stack.is_empty() {
        lines.push(format!("  stack: {}", current.project.tech_stack.join(", ")));
    }
    let partner_role = current
        .partner
        .role
        .map(|role| format!(" ({role})"))
        .unwrap_or_default();
    lines.push(format!("partner: {}{partner_role}", current.partner.display_name));
    lines
}

pub fn review_line(review: &Review) -> String {
    match review.status {
        ReviewStatus::Pending => "review pending".to_string(),
        ReviewStatus::Failed => format!(
            "review failed: {}",
            review.feedback.as_deref().unwrap_or("no details")
        ),
        ReviewStatus::Completed => {
            let score = review
                .score
                .map(|score| format!("score {score}"))
                .unwrap_or_else(|| "no score".into());
            match &review.feedback {
                Some(feedback) => format!("review complete, {score}: {feedback}"),
                None => format!("review complete, {score}"),
            }
        }
    }
}

/// Turns successive views into output lines, printing each message once and
/// announcing state changes.
#[derive(Debug, Default)]
pub struct ViewPrinter {
    printed: usize,
    state: Option<SessionState>,
    loading: bool,
    error: Option<String>,
}

impl ViewPrinter {
    pub fn render(&mut self, view: &ChatView) -> Vec<String> {
        let mut lines = Vec::new();
        if view.messages.len() < self.printed {
            self.printed = 0;
        }
        if view.loading_history && !self.loading {
            lines.push("-- loading history --".to_string());
        }
        self.loading = view.loading_history;
        if self.state != Some(view.state) {
            lines.push(format!("-- {} --", view.state));
            self.state = Some(view.state);
        }
        let error = view.error.as_ref().map(ToString::to_string);
        if error.is_some() && error != self.error {
            lines.push(format!("!! {}", error.as_deref().unwrap_or_default()));
        }
        self.error = error;
        for message in &view.messages[self.printed..] {
            lines.push(message_line(message));
        }
        self.printed = view.messages.len();
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ChatError;
    use time::macros::datetime;

    fn message(id: &str, content: &str) -> ChatMessage {
        ChatMessage {
            id: id.into(),
            conversation_id: "m1".into(),
            sender_id: "u1".into(),
            sender_display_name: "Ada".into(),
            content: content.into(),
            created_at: datetime!(2024-05-01 09:05 UTC),
        }
    }

    #[test]
    fn formats_message_with_clock() {
        assert_eq!(message_line(&message("1", "hi")), "[09:05] Ada: hi");
    }

    #[test]
    fn printer_emits_only_new_lines() {
        let mut printer = ViewPrinter::default();
        let mut view = ChatView {
            conversation_id: Some("m1".into()),
            state: SessionState::Connecting,
            loading_history: true,
            ..ChatView::default()
        };
        assert_eq!(
            printer.render(&view),
            vec!["-- loading history --", "-- connecting --"]
        );

        view.loading_history = false;
        view.state = SessionState::Active;
        view.messages.push(message("1", "hi"));
        assert_eq!(printer.render(&view), vec!["-- active --", "[09:05] Ada: hi"]);

        view.messages.push(message("2", "there"));
        assert_eq!(printer.render(&view), vec!["[09:05] Ada: there"]);

        view.state = SessionState::FailedPermanent;
        view.error = Some(ChatError::SessionExpired);
        assert_eq!(
            printer.render(&view),
            vec!["-- failed --", "!! session expired; sign in again"]
        );
        assert!(printer.render(&view).is_empty());
    }

    #[test]
    fn queue_states_read_naturally() {
        let status = QueueStatus {
            state: QueueState::Waiting,
            position: Some(3),
            match_id: None,
        };
        assert_eq!(queue_line(&status), "waiting (position 3)");
    }
}
