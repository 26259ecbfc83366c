use thiserror::Error;
use url::Url;

use crate::client::MatchmakingApi;
use crate::error::ApiError;
use crate::model::{CompletionRequest, Review};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionDraft {
    pub repository_url: String,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionState {
    Closed,
    Editing(CompletionDraft),
    Submitting,
    Submitted(Review),
    Failed {
        draft: CompletionDraft,
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion form is not open")]
    NotEditing,
    #[error("repository url must be an http(s) link: {0}")]
    InvalidRepositoryUrl(String),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Sprint-completion submission for one match.
///
/// Opening the flow is the only place the draft is reset; reading the state
/// never mutates it.
#[derive(Debug)]
pub struct CompletionFlow {
    match_id: String,
    state: CompletionState,
}

impl CompletionFlow {
    pub fn new(match_id: impl Into<String>) -> Self {
        Self {
            match_id: match_id.into(),
            state: CompletionState::Closed,
        }
    }

    pub fn match_id(&self) -> &str {
        &self.match_id
    }

    pub fn state(&self) -> &CompletionState {
        &self.state
    }

    pub fn open(&mut self) {
        self.state = CompletionState::Editing(CompletionDraft::default());
    }

    pub fn close(&mut self) {
        self.state = CompletionState::Closed;
    }

    /// Editable draft while the form is open, including after a failed submit.
    pub fn draft_mut(&mut self) -> Option<&mut CompletionDraft> {
        match &mut self.state {
            CompletionState::Editing(draft) | CompletionState::Failed { draft, .. } => Some(draft),
            _ => None,
        }
    }

    pub async fn submit(&mut self, api: &dyn MatchmakingApi) -> Result<Review, CompletionError> {
        let draft = match &self.state {
            CompletionState::Editing(draft) | CompletionState::Failed { draft, .. } => {
                draft.clone()
            }
            _ => return Err(CompletionError::NotEditing),
        };
        let request = validate(&draft)?;

        self.state = CompletionState::Submitting;
        match api.submit_completion(&self.match_id, &request).await {
            Ok(review) => {
                tracing::info!(
                    target: "devmatch::completion",
                    match_id = %self.match_id,
                    status = ?review.status,
                    "completion submitted"
                );
                self.state = CompletionState::Submitted(review.clone());
                Ok(review)
            }
            Err(err) => {
                tracing::warn!(
                    target: "devmatch::completion",
                    match_id = %self.match_id,
                    error = %err,
                    "completion submit failed"
                );
                self.state = CompletionState::Failed {
                    draft,
                    message: err.to_string(),
                };
                Err(err.into())
            }
        }
    }
}

fn validate(draft: &CompletionDraft) -> Result<CompletionRequest, CompletionError> {
    let raw = draft.repository_url.trim();
    let parsed =
        Url::parse(raw).map_err(|_| CompletionError::InvalidRepositoryUrl(raw.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(CompletionError::InvalidRepositoryUrl(raw.to_string()));
    }
    let notes = draft.notes.trim();
    Ok(CompletionRequest {
        repository_url: parsed.to_string(),
        notes: (!notes.is_empty()).then(|| notes.to_string()),
    })
}
