use std::fmt;
use std::time::Duration;

use super::reconnect::{FailureKind, ReconnectPolicy};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Active,
    FailedRetryable,
    FailedPermanent,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Active => "active",
            SessionState::FailedRetryable => "reconnecting",
            SessionState::FailedPermanent => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermanentCause {
    Authorization,
    RetriesExhausted { attempts: u32 },
}

/// What the driver must do after a failure was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Retry { attempt: u32, delay: Duration },
    Permanent(PermanentCause),
}

/// Session state for one activation plus the consecutive-failure counter.
#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: SessionState,
    attempts: u32,
    ever_active: bool,
    policy: ReconnectPolicy,
}

impl ConnectionMachine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: SessionState::Disconnected,
            attempts: 0,
            ever_active: false,
            policy,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Consecutive retryable failures since the last time the session was active.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Returns false when the machine is in a state that does not connect.
    pub fn begin_connect(&mut self) -> bool {
        match self.state {
            SessionState::Disconnected | SessionState::FailedRetryable => {
                self.state = SessionState::Connecting;
                true
            }
            _ => false,
        }
    }

    pub fn handshake_accepted(&mut self) {
        if self.state == SessionState::Connecting {
            self.state = SessionState::Active;
            self.attempts = 0;
            self.ever_active = true;
        }
    }

    /// Records a failure of the current connection. `None` when there is no
    /// live connection for the failure to belong to.
    pub fn fail(&mut self, kind: FailureKind) -> Option<Transition> {
        let connecting = match self.state {
            SessionState::Connecting => true,
            SessionState::Active => false,
            _ => return None,
        };

        if kind == FailureKind::Authorization || (connecting && !self.ever_active) {
            self.state = SessionState::FailedPermanent;
            return Some(Transition::Permanent(PermanentCause::Authorization));
        }

        let attempt = self.attempts + 1;
        match self.policy.delay_for(attempt) {
            Some(delay) => {
                self.attempts = attempt;
                self.state = SessionState::FailedRetryable;
                Some(Transition::Retry { attempt, delay })
            }
            None => {
                self.state = SessionState::FailedPermanent;
                Some(Transition::Permanent(PermanentCause::RetriesExhausted {
                    attempts: self.attempts,
                }))
            }
        }
    }

    pub fn deactivate(&mut self) {
        self.state = SessionState::Disconnected;
    }
}
