//! HTTP client for the devmatch backend: authentication, role selection, the
//! matching queue, match details, chat history and completion review.
//!
//! The backend owns every decision; this crate only moves typed requests and
//! responses. The session cookie issued by the OAuth login is treated as an
//! ambient credential and attached to every request by [`ApiClient`].

pub mod auth;
pub mod client;
pub mod completion;
pub mod config;
pub mod error;
pub mod model;
pub mod queue;

#[cfg(test)]
mod testing;

pub use auth::Navigator;
pub use client::{ApiClient, MatchmakingApi};
pub use config::ApiConfig;
pub use error::ApiError;
pub use model::{
    ChatMessage, CompletionRequest, Match, Partner, Project, QueueState, QueueStatus, Review,
    ReviewStatus, Role, User,
};
