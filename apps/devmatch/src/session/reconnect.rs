//! Retry timing and failure classification for the chat session.

use std::time::Duration;

use crate::protocol::stomp::Frame;
use crate::transport::{CloseReason, TransportError};

/// WebSocket close code for a policy violation; brokers use it to drop
/// unauthenticated sessions.
pub const POLICY_VIOLATION: u16 = 1008;

const AUTH_MARKERS: &[&str] = &["unauthorized", "forbidden", "expired", "access denied"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The server will keep refusing until the user re-authenticates.
    Authorization,
    Transient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(30_000),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (1-based): `min(base * 2^attempt, max)`.
    /// `None` once the budget is spent.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        Some(self.base_delay.saturating_mul(factor).min(self.max_delay))
    }
}

pub fn classify_connect_error(err: &TransportError) -> FailureKind {
    match err {
        TransportError::Rejected(401 | 403) => FailureKind::Authorization,
        _ => FailureKind::Transient,
    }
}

pub fn classify_close(reason: &CloseReason) -> FailureKind {
    match reason.code {
        Some(POLICY_VIOLATION) => FailureKind::Authorization,
        _ => FailureKind::Transient,
    }
}

/// A STOMP `ERROR` frame. The `status` header wins when present; the
/// `message` text is only inspected when the broker gives nothing else.
pub fn classify_error_frame(frame: &Frame) -> FailureKind {
    if let Some(status) = frame.get("status").and_then(|s| s.trim().parse::<u16>().ok()) {
        return match status {
            401 | 403 => FailureKind::Authorization,
            _ => FailureKind::Transient,
        };
    }
    let message = frame.get("message").unwrap_or_default().to_ascii_lowercase();
    if AUTH_MARKERS.iter().any(|marker| message.contains(marker)) {
        FailureKind::Authorization
    } else {
        FailureKind::Transient
    }
}
