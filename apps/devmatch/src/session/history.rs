use async_trait::async_trait;
use devmatch_api::{ApiClient, ApiError, ChatMessage, MatchmakingApi};

pub const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("history unavailable: {0}")]
    Unavailable(String),
}

/// Request/response backlog for a conversation, oldest first.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn load_history(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, FetchError>;
}

#[async_trait]
impl HistorySource for ApiClient {
    async fn load_history(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, FetchError> {
        Ok(self.chat_history(conversation_id, limit).await?)
    }
}
