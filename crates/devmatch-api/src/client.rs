use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::model::{
    ChatMessage, CompletionRequest, Match, QueueStatus, Review, Role, RoleRequest, User,
};

/// Everything the client needs from the backend. Implemented by [`ApiClient`];
/// tests substitute scripted implementations.
#[async_trait]
pub trait MatchmakingApi: Send + Sync {
    async fn current_user(&self) -> Result<User, ApiError>;

    async fn logout(&self) -> Result<(), ApiError>;

    async fn select_role(&self, role: Role) -> Result<User, ApiError>;

    async fn join_queue(&self) -> Result<QueueStatus, ApiError>;

    async fn queue_status(&self) -> Result<QueueStatus, ApiError>;

    async fn leave_queue(&self) -> Result<(), ApiError>;

    /// Returns `None` when the user has no active match.
    async fn current_match(&self) -> Result<Option<Match>, ApiError>;

    /// Persisted chat backlog, oldest first.
    async fn chat_history(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, ApiError>;

    async fn submit_completion(
        &self,
        match_id: &str,
        request: &CompletionRequest,
    ) -> Result<Review, ApiError>;

    async fn review(&self, match_id: &str) -> Result<Review, ApiError>;
}

#[derive(Clone)]
pub struct ApiClient {
    config: Arc<ApiConfig>,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(cookie) = config.session_cookie() {
            let value = HeaderValue::from_str(cookie).map_err(|err| {
                ApiError::InvalidConfig(format!("session cookie is not a valid header: {err}"))
            })?;
            headers.insert(header::COOKIE, value);
        }
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(8))
            .default_headers(headers)
            .no_proxy()
            .build()?;
        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    async fn request<B, T>(
        &self,
        method: Method,
        endpoint: Url,
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self.execute(method, endpoint, body).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|err| ApiError::InvalidResponse(err.to_string()))
    }

    async fn execute<B>(
        &self,
        method: Method,
        endpoint: Url,
        body: Option<&B>,
    ) -> Result<reqwest::Response, ApiError>
    where
        B: Serialize + ?Sized + Sync,
    {
        tracing::debug!(target: "devmatch::api", %method, url = %endpoint, "api request");
        let mut builder = self.client.request(method, endpoint);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!(target: "devmatch::api", %status, "api request rejected");
            return Err(ApiError::from_status(status));
        }
        Ok(response)
    }
}

const NO_BODY: Option<&()> = None;

#[async_trait]
impl MatchmakingApi for ApiClient {
    async fn current_user(&self) -> Result<User, ApiError> {
        let endpoint = self.config.endpoint(&["api", "auth", "me"])?;
        self.request(Method::GET, endpoint, NO_BODY).await
    }

    async fn logout(&self) -> Result<(), ApiError> {
        let endpoint = self.config.endpoint(&["api", "auth", "logout"])?;
        self.execute(Method::POST, endpoint, NO_BODY).await?;
        Ok(())
    }

    async fn select_role(&self, role: Role) -> Result<User, ApiError> {
        let endpoint = self.config.endpoint(&["api", "users", "me", "role"])?;
        self.request(Method::POST, endpoint, Some(&RoleRequest { role }))
            .await
    }

    async fn join_queue(&self) -> Result<QueueStatus, ApiError> {
        let endpoint = self.config.endpoint(&["api", "queue", "join"])?;
        self.request(Method::POST, endpoint, NO_BODY).await
    }

    async fn queue_status(&self) -> Result<QueueStatus, ApiError> {
        let endpoint = self.config.endpoint(&["api", "queue", "status"])?;
        self.request(Method::GET, endpoint, NO_BODY).await
    }

    async fn leave_queue(&self) -> Result<(), ApiError> {
        let endpoint = self.config.endpoint(&["api", "queue", "leave"])?;
        self.execute(Method::DELETE, endpoint, NO_BODY).await?;
        Ok(())
    }

    async fn current_match(&self) -> Result<Option<Match>, ApiError> {
        let endpoint = self.config.endpoint(&["api", "matches", "current"])?;
        match self.execute(Method::GET, endpoint, NO_BODY).await {
            Ok(response) if response.status() == StatusCode::NO_CONTENT => Ok(None),
            Ok(response) => {
                let bytes = response.bytes().await?;
                serde_json::from_slice(&bytes)
                    .map(Some)
                    .map_err(|err| ApiError::InvalidResponse(err.to_string()))
            }
            Err(ApiError::HttpStatus(StatusCode::NOT_FOUND)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn chat_history(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, ApiError> {
        let mut endpoint = self
            .config
            .endpoint(&["api", "chat", conversation_id, "messages"])?;
        endpoint
            .query_pairs_mut()
            .append_pair("limit", &limit.to_string());
        self.request(Method::GET, endpoint, NO_BODY).await
    }

    async fn submit_completion(
        &self,
        match_id: &str,
        request: &CompletionRequest,
    ) -> Result<Review, ApiError> {
        let endpoint = self
            .config
            .endpoint(&["api", "matches", match_id, "completion"])?;
        self.request(Method::POST, endpoint, Some(request)).await
    }

    async fn review(&self, match_id: &str) -> Result<Review, ApiError> {
        let endpoint = self
            .config
            .endpoint(&["api", "matches", match_id, "review"])?;
        self.request(Method::GET, endpoint, NO_BODY).await
    }
}
