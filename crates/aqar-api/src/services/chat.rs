//! Chat endpoints under `/chats`.

use serde::de::IgnoredAny;
use serde::Deserialize;

use aqar_shared::chat::{Chat, ChatMessage, MessagePage, UnreadCount};
use aqar_shared::constants::{CHATS_BASE_PATH, MESSAGES_PER_PAGE};
use aqar_shared::{ChatId, MessageId, UserId};

use crate::body::{FilePart, FormData, RequestBody};
use crate::client::{ApiClient, RequestOptions};
use crate::error::Result;
use crate::query::QueryParams;

/// Text and/or image for a new message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendMessageRequest {
    pub message: Option<String>,
    pub image: Option<FilePart>,
}

impl SendMessageRequest {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            image: None,
        }
    }

    /// Multipart body; empty text is left out.
    pub fn into_form(self) -> FormData {
        let mut form = FormData::new();
        if let Some(message) = self.message.filter(|m| !m.is_empty()) {
            form = form.text("message", message);
        }
        if let Some(image) = self.image {
            form = form.file("image", image);
        }
        form
    }
}

#[derive(Debug, Deserialize)]
struct ChatList {
    data: Vec<Chat>,
}

#[derive(Clone)]
pub struct ChatService {
    api: ApiClient,
}

impl ChatService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Start a chat with `other_user_id`, or resume the existing one.
    pub async fn start_chat(&self, other_user_id: UserId) -> Result<Chat> {
        let form = FormData::new().text("other_user_id", other_user_id);
        self.api
            .post(&format!("{CHATS_BASE_PATH}/start"), form, RequestOptions::default())
            .await
    }

    pub async fn my_chats(&self) -> Result<Vec<Chat>> {
        let list: ChatList = self
            .api
            .get(
                &format!("{CHATS_BASE_PATH}/my-chats"),
                QueryParams::new(),
                RequestOptions::default(),
            )
            .await?;
        Ok(list.data)
    }

    /// One history page, newest-first.
    pub async fn messages(&self, chat_id: ChatId, page: u32) -> Result<MessagePage> {
        let params = QueryParams::new()
            .with("per_page", MESSAGES_PER_PAGE)
            .with("page", page);
        self.api
            .get(
                &format!("{CHATS_BASE_PATH}/{chat_id}/messages"),
                params,
                RequestOptions::default(),
            )
            .await
    }

    pub async fn send_message(&self, chat_id: ChatId, request: SendMessageRequest) -> Result<ChatMessage> {
        self.api
            .post(
                &format!("{CHATS_BASE_PATH}/{chat_id}/send"),
                request.into_form(),
                RequestOptions::default(),
            )
            .await
    }

    pub async fn mark_as_read(&self, chat_id: ChatId) -> Result<()> {
        let _: IgnoredAny = self
            .api
            .post(
                &format!("{CHATS_BASE_PATH}/{chat_id}/mark-read"),
                RequestBody::empty_object(),
                RequestOptions::default(),
            )
            .await?;
        Ok(())
    }

    pub async fn unread_count(&self) -> Result<u64> {
        let count: UnreadCount = self
            .api
            .get(
                &format!("{CHATS_BASE_PATH}/unread-count"),
                QueryParams::new(),
                RequestOptions::default(),
            )
            .await?;
        Ok(count.count)
    }

    /// Hide a message for the current user only.
    pub async fn delete_message(&self, message_id: MessageId) -> Result<()> {
        let _: IgnoredAny = self
            .api
            .delete(
                &format!("{CHATS_BASE_PATH}/message/{message_id}"),
                RequestBody::Empty,
                RequestOptions::default(),
            )
            .await?;
        Ok(())
    }

    pub async fn delete_message_for_everyone(&self, message_id: MessageId) -> Result<()> {
        let _: IgnoredAny = self
            .api
            .delete(
                &format!("{CHATS_BASE_PATH}/message/{message_id}/for-everyone"),
                RequestBody::Empty,
                RequestOptions::default(),
            )
            .await?;
        Ok(())
    }

    /// Clear the whole history for the current user.
    pub async fn clear_chat(&self, chat_id: ChatId) -> Result<()> {
        let _: IgnoredAny = self
            .api
            .delete(
                &format!("{CHATS_BASE_PATH}/{chat_id}/messages/clear-for-me"),
                RequestBody::Empty,
                RequestOptions::default(),
            )
            .await?;
        Ok(())
    }
}
