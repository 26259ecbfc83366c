use std::collections::HashSet;

use devmatch_api::ChatMessage;

/// The visible sequence for one activation. History and live deliveries both
/// go through [`append`](Self::append), so an id appears at most once and the
/// first arrival keeps its position.
#[derive(Debug, Default)]
pub struct MessageLog {
    seen: HashSet<String>,
    messages: Vec<ChatMessage>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `message` unless its id was already seen. Returns the stored
    /// message when it was new.
    pub fn append(&mut self, message: ChatMessage) -> Option<&ChatMessage> {
        if !self.seen.insert(message.id.clone()) {
            return None;
        }
        self.messages.push(message);
        self.messages.last()
    }

    /// Merges a history batch: sorted by `created_at` (stable), then appended
    /// one by one. Returns the messages that were new.
    pub fn merge_history(&mut self, mut batch: Vec<ChatMessage>) -> &[ChatMessage] {
        let before = self.messages.len();
        batch.sort_by_key(|message| message.created_at);
        for message in batch {
            self.append(message);
        }
        &self.messages[before..]
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
