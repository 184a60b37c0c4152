use std::collections::HashSet;

use aqar_shared::chat::ChatMessage;
use aqar_shared::MessageId;

/// The messages shown for one chat, oldest first, at most one per id.
///
/// Entries keep insertion order. A message that arrives late over the live
/// channel is appended where it lands, not sorted by `created_at`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageBuffer {
    messages: Vec<ChatMessage>,
    ids: HashSet<MessageId>,
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents with a history page already in display order.
    /// Repeated ids keep their first occurrence.
    pub fn seed(&mut self, messages: Vec<ChatMessage>) {
        self.messages.clear();
        self.ids.clear();
        for message in messages {
            self.push_if_absent(message);
        }
    }

    /// Append unless a message with the same id is already present.
    /// Returns whether the buffer changed.
    pub fn push_if_absent(&mut self, message: ChatMessage) -> bool {
        if !self.ids.insert(message.id) {
            return false;
        }
        self.messages.push(message);
        true
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.ids.contains(&id)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn ids(&self) -> Vec<MessageId> {
        self.messages.iter().map(|m| m.id).collect()
    }

    pub fn last_id(&self) -> Option<MessageId> {
        self.messages.last().map(|m| m.id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
