//! Native client for the devmatch backend. The interesting part is the chat
//! session: a STOMP subscription over WebSocket, merged with the HTTP message
//! history, that reconnects with capped exponential backoff.

pub mod client;
pub mod config;
pub mod protocol;
pub mod session;
pub mod telemetry;
pub mod terminal;
pub mod transport;

pub use client::{ChatClient, ChatController, ChatSession};
pub use config::{Config, ConfigError};
pub use session::{ChatError, ChatView, SessionOptions, SessionState};
