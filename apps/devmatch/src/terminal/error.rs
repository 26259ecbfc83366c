use devmatch_api::ApiError;
use devmatch_api::completion::CompletionError;
use devmatch_api::queue::QueueError;
use std::io;
use thiserror::Error;

use crate::config::ConfigError;
use crate::session::{ChatError, FetchError};

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("{0}")]
    Queue(#[from] QueueError),
    #[error("{0}")]
    Completion(#[from] CompletionError),
    #[error("{0}")]
    History(#[from] FetchError),
    #[error("{0}")]
    Chat(#[from] ChatError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("no active match")]
    NoMatch,
}
