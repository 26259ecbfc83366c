use devmatch_api::ChatMessage;

use super::state::{PermanentCause, SessionState};

/// Conditions surfaced to whoever renders the chat.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    #[error("could not load chat history: {0}")]
    History(String),
    #[error("session expired; sign in again")]
    SessionExpired,
    #[error("lost connection to chat after {attempts} reconnect attempts")]
    RetriesExhausted { attempts: u32 },
}

impl From<PermanentCause> for ChatError {
    fn from(cause: PermanentCause) -> Self {
        match cause {
            PermanentCause::Authorization => ChatError::SessionExpired,
            PermanentCause::RetriesExhausted { attempts } => ChatError::RetriesExhausted { attempts },
        }
    }
}

/// Snapshot of one activation as the caller sees it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatView {
    pub conversation_id: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub state: SessionState,
    pub loading_history: bool,
    pub error: Option<ChatError>,
}

impl ChatView {
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Sending is only offered while the session is active.
    pub fn can_send(&self) -> bool {
        self.is_connected() && self.conversation_id.is_some()
    }
}
