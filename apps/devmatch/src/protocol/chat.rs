//! The chat conversation's use of STOMP: which destinations exist and what
//! the client puts on the wire.

use devmatch_api::ChatMessage;
use serde::Serialize;

use super::heartbeat::HeartBeat;
use super::stomp::{Command, Frame};

pub const ACCEPT_VERSION: &str = "1.2,1.1";
pub const TOPIC_PREFIX: &str = "/topic/chat/";
pub const SEND_DESTINATION: &str = "/app/chat.send";

pub fn topic_for(conversation_id: &str) -> String {
    format!("{TOPIC_PREFIX}{conversation_id}")
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageBody<'a> {
    conversation_id: &'a str,
    content: &'a str,
}

pub fn connect_frame(host: Option<&str>, heart_beat: HeartBeat) -> Frame {
    let mut frame = Frame::new(Command::Connect).header("accept-version", ACCEPT_VERSION);
    if let Some(host) = host {
        frame = frame.header("host", host);
    }
    frame.header("heart-beat", heart_beat.header_value())
}

pub fn subscribe_frame(conversation_id: &str, subscription_id: &str) -> Frame {
    Frame::new(Command::Subscribe)
        .header("id", subscription_id)
        .header("destination", topic_for(conversation_id))
        .header("ack", "auto")
}

pub fn send_frame(conversation_id: &str, content: &str) -> Result<Frame, serde_json::Error> {
    let body = serde_json::to_string(&SendMessageBody {
        conversation_id,
        content,
    })?;
    Ok(Frame::new(Command::Send)
        .header("destination", SEND_DESTINATION)
        .header("content-type", "application/json")
        .with_body(body))
}

pub fn disconnect_frame() -> Frame {
    Frame::new(Command::Disconnect)
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("delivery for subscription {0:?} does not belong to this session")]
    ForeignSubscription(String),
    #[error("delivery body is not a chat message: {0}")]
    Body(#[from] serde_json::Error),
    #[error("message {id} belongs to conversation {conversation_id}")]
    WrongConversation { id: String, conversation_id: String },
}

/// Extracts the chat message from a MESSAGE frame delivered on our topic.
pub fn parse_delivery(
    frame: &Frame,
    conversation_id: &str,
    subscription_id: &str,
) -> Result<ChatMessage, DeliveryError> {
    if let Some(subscription) = frame.get("subscription") {
        if subscription != subscription_id {
            return Err(DeliveryError::ForeignSubscription(subscription.to_string()));
        }
    }
    let message: ChatMessage = serde_json::from_str(&frame.body)?;
    if message.conversation_id != conversation_id {
        return Err(DeliveryError::WrongConversation {
            id: message.id,
            conversation_id: message.conversation_id,
        });
    }
    Ok(message)
}
