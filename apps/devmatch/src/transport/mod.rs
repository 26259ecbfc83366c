//! The byte pipe underneath the chat session: one bidirectional text
//! connection per [`Transport::connect`] call.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub mod memory;
pub mod websocket;

pub use memory::{MemoryServer, MemoryTransport, RemoteEnd};
pub use websocket::{WebSocketConfig, WebSocketTransport};

/// How long [`TransportLink::close`] waits for the pump to flush before
/// aborting it.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("upgrade rejected with HTTP status {0}")]
    Rejected(u16),
    #[error("websocket error: {0}")]
    WebSocket(String),
    #[error("transport is closed")]
    Closed,
}

/// Why the far end went away. Both fields are empty when the connection
/// dropped without a close frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloseReason {
    pub code: Option<u16>,
    pub reason: String,
}

impl CloseReason {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Text(String),
    Closed(CloseReason),
}

/// An open connection. Outbound text goes through [`send`](Self::send),
/// inbound events come from [`next_event`](Self::next_event). Dropping the
/// link aborts its pump without a closing handshake.
pub struct TransportLink {
    outbound: Option<mpsc::UnboundedSender<String>>,
    inbound: mpsc::UnboundedReceiver<TransportEvent>,
    pump: Option<JoinHandle<()>>,
}

impl TransportLink {
    pub fn new(
        outbound: mpsc::UnboundedSender<String>,
        inbound: mpsc::UnboundedReceiver<TransportEvent>,
        pump: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            outbound: Some(outbound),
            inbound,
            pump,
        }
    }

    pub fn send(&self, text: String) -> Result<(), TransportError> {
        self.outbound
            .as_ref()
            .ok_or(TransportError::Closed)?
            .send(text)
            .map_err(|_| TransportError::Closed)
    }

    /// Next inbound event. A pump that ended without reporting a close is
    /// reported as a close without a code.
    pub async fn next_event(&mut self) -> TransportEvent {
        self.inbound
            .recv()
            .await
            .unwrap_or_else(|| TransportEvent::Closed(CloseReason::default()))
    }

    /// Stops accepting outbound text and lets the pump finish its closing
    /// handshake, aborting it after a short grace period.
    pub async fn close(mut self) {
        self.outbound.take();
        if let Some(mut pump) = self.pump.take() {
            if tokio::time::timeout(CLOSE_GRACE, &mut pump).await.is_err() {
                pump.abort();
            }
        }
    }
}

impl Drop for TransportLink {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

impl std::fmt::Debug for TransportLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportLink")
            .field("open", &self.outbound.is_some())
            .field("pumped", &self.pump.is_some())
            .finish()
    }
}

/// Opens connections to a fixed endpoint. Credentials are the transport's
/// business; callers only see accept or reject.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> Result<TransportLink, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_timeout::tokio_timeout_test]
    async fn link_reports_close_when_channel_ends() {
        let (out_tx, _out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let mut link = TransportLink::new(out_tx, in_rx, None);

        in_tx.send(TransportEvent::Text("hello".into())).unwrap();
        drop(in_tx);
        assert_eq!(link.next_event().await, TransportEvent::Text("hello".into()));
        assert_eq!(
            link.next_event().await,
            TransportEvent::Closed(CloseReason::default())
        );
    }

    #[test_timeout::tokio_timeout_test]
    async fn send_fails_once_far_end_is_gone() {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (_in_tx, in_rx) = mpsc::unbounded_channel();
        let link = TransportLink::new(out_tx, in_rx, None);
        drop(out_rx);
        assert_eq!(link.send("x".into()), Err(TransportError::Closed));
    }

    #[test_timeout::tokio_timeout_test(paused)]
    async fn close_aborts_a_stuck_pump() {
        let (out_tx, _out_rx) = mpsc::unbounded_channel();
        let (_in_tx, in_rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(std::future::pending::<()>());
        let link = TransportLink::new(out_tx, in_rx, Some(pump));
        let started = tokio::time::Instant::now();
        link.close().await;
        assert!(started.elapsed() >= CLOSE_GRACE);
    }
}
