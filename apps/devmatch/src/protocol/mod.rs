//! Session framing carried over the transport: STOMP frames, heart-beat
//! negotiation and the chat destinations.

pub mod chat;
pub mod heartbeat;
pub mod stomp;

pub use heartbeat::{HeartBeat, HeartbeatMonitor, Negotiated};
pub use stomp::{Command, Frame, FrameError};
