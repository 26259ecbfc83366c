//! Scripted [`MatchmakingApi`] used by the unit tests in this crate.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::client::MatchmakingApi;
use crate::error::ApiError;
use crate::model::{ChatMessage, CompletionRequest, Match, QueueStatus, Review, Role, User};

#[derive(Default)]
pub(crate) struct ScriptedApi {
    logout_status: Option<StatusCode>,
    queue_statuses: Mutex<VecDeque<Result<QueueStatus, StatusCode>>>,
    queue_polls: Mutex<usize>,
    completion: Mutex<Option<Result<Review, StatusCode>>>,
    submitted: Mutex<Vec<(String, CompletionRequest)>>,
}

impl ScriptedApi {
    pub(crate) fn with_logout_status(mut self, status: StatusCode) -> Self {
        self.logout_status = Some(status);
        self
    }

    pub(crate) fn with_queue_statuses(
        self,
        statuses: impl IntoIterator<Item = Result<QueueStatus, StatusCode>>,
    ) -> Self {
        self.queue_statuses.lock().unwrap().extend(statuses);
        self
    }

    pub(crate) fn with_completion(self, result: Result<Review, StatusCode>) -> Self {
        *self.completion.lock().unwrap() = Some(result);
        self
    }

    pub(crate) fn queue_polls(&self) -> usize {
        *self.queue_polls.lock().unwrap()
    }

    pub(crate) fn submitted(&self) -> Vec<(String, CompletionRequest)> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl MatchmakingApi for ScriptedApi {
    async fn current_user(&self) -> Result<User, ApiError> {
        unimplemented!("current_user is not scripted")
    }

    async fn logout(&self) -> Result<(), ApiError> {
        match self.logout_status {
            None => Ok(()),
            Some(status) => Err(ApiError::from_status(status)),
        }
    }

    async fn select_role(&self, _role: Role) -> Result<User, ApiError> {
        unimplemented!("select_role is not scripted")
    }

    async fn join_queue(&self) -> Result<QueueStatus, ApiError> {
        unimplemented!("join_queue is not scripted")
    }

    async fn queue_status(&self) -> Result<QueueStatus, ApiError> {
        *self.queue_polls.lock().unwrap() += 1;
        let next = self
            .queue_statuses
            .lock()
            .unwrap()
            .pop_front()
            .expect("queue status script exhausted");
        next.map_err(ApiError::from_status)
    }

    async fn leave_queue(&self) -> Result<(), ApiError> {
        Ok(())
    }

    async fn current_match(&self) -> Result<Option<Match>, ApiError> {
        Ok(None)
    }

    async fn chat_history(
        &self,
        _conversation_id: &str,
        _limit: usize,
    ) -> Result<Vec<ChatMessage>, ApiError> {
        Ok(Vec::new())
    }

    async fn submit_completion(
        &self,
        match_id: &str,
        request: &CompletionRequest,
    ) -> Result<Review, ApiError> {
        self.submitted
            .lock()
            .unwrap()
            .push((match_id.to_string(), request.clone()));
        self.completion
            .lock()
            .unwrap()
            .clone()
            .expect("completion result not scripted")
            .map_err(ApiError::from_status)
    }

    async fn review(&self, _match_id: &str) -> Result<Review, ApiError> {
        unimplemented!("review is not scripted")
    }
}
