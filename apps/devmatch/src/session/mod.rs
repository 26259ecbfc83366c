//! One chat activation: connection lifecycle, reconnection policy and the
//! merged history/live message view.

pub mod driver;
pub mod history;
pub mod reconciler;
pub mod reconnect;
pub mod state;
pub mod view;

pub use driver::{DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_HEARTBEAT, SessionOptions};
pub use history::{DEFAULT_HISTORY_LIMIT, FetchError, HistorySource};
pub use reconciler::MessageLog;
pub use reconnect::{FailureKind, ReconnectPolicy};
pub use state::{ConnectionMachine, PermanentCause, SessionState, Transition};
pub use view::{ChatError, ChatView};
