//! Chat models as the backend serializes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ChatId, MessageId, UserId};

/// A participant as embedded in chats and messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatUser {
    pub id: UserId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A single message. Owned by exactly one chat; the server assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender_id: UserId,
    /// Text body; `None` for attachment-only messages.
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<Box<ChatMessage>>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<ChatUser>,
}

impl ChatMessage {
    pub fn is_from(&self, user: UserId) -> bool {
        self.sender_id == user
    }

    pub fn text(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }
}

/// A two-party conversation as seen by the current user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chat {
    pub id: ChatId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_user: Option<ChatUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<ChatMessage>,
    #[serde(default)]
    pub unread_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageMeta {
    pub current_page: u32,
    pub last_page: u32,
    pub per_page: u32,
    pub total: u64,
}

impl PageMeta {
    pub fn has_more(&self) -> bool {
        self.current_page < self.last_page
    }
}

/// One page of chat history. `data` is newest-first, as the server sends it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessagePage {
    pub data: Vec<ChatMessage>,
    pub meta: PageMeta,
}

impl MessagePage {
    /// Messages in display order (oldest first).
    pub fn into_chronological(self) -> Vec<ChatMessage> {
        let mut messages = self.data;
        messages.reverse();
        messages
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StartChatRequest {
    pub other_user_id: UserId,
}

/// Payload of the `new-message` live event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewMessageEvent {
    pub message: ChatMessage,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnreadCount {
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_json(id: u64) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "chat_id": 42,
            "sender_id": 7,
            "message": "hello",
            "is_read": false,
            "created_at": "2025-03-01T10:00:00.000000Z",
            "sender": { "id": 7, "name": "Sara" }
        })
    }

    #[test]
    fn decodes_backend_message() {
        let msg: ChatMessage = serde_json::from_value(message_json(501)).unwrap();
        assert_eq!(msg.id, MessageId(501));
        assert_eq!(msg.chat_id, ChatId(42));
        assert_eq!(msg.text(), "hello");
        assert!(msg.is_from(UserId(7)));
        assert!(msg.reply_to.is_none());
        assert_eq!(msg.sender.unwrap().name, "Sara");
    }

    #[test]
    fn null_body_and_reply() {
        let mut json = message_json(9);
        json["message"] = serde_json::Value::Null;
        json["image_url"] = "https://cdn.example/a.jpg".into();
        json["reply_to"] = message_json(8);
        let msg: ChatMessage = serde_json::from_value(json).unwrap();
        assert_eq!(msg.text(), "");
        assert_eq!(msg.reply_to.unwrap().id, MessageId(8));
    }

    #[test]
    fn page_into_chronological() {
        let page = MessagePage {
            data: [503, 502, 501]
                .into_iter()
                .map(|id| serde_json::from_value(message_json(id)).unwrap())
                .collect(),
            meta: PageMeta { current_page: 1, last_page: 2, per_page: 20, total: 23 },
        };
        assert!(page.meta.has_more());
        let ids: Vec<u64> = page.into_chronological().iter().map(|m| m.id.0).collect();
        assert_eq!(ids, vec![501, 502, 503]);
    }
}
