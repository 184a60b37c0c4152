//! The network seams the chat view depends on.

use async_trait::async_trait;
use tokio::sync::mpsc;

use aqar_api::services::{ChatService, SendMessageRequest};
use aqar_api::Result as ApiResult;
use aqar_realtime::{LiveEvent, LiveHandle, Result as LiveResult};
use aqar_shared::chat::{Chat, ChatMessage, MessagePage};
use aqar_shared::{ChatId, UserId};

#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn start_chat(&self, peer: UserId) -> ApiResult<Chat>;
    async fn messages(&self, chat_id: ChatId, page: u32) -> ApiResult<MessagePage>;
    async fn send_text(&self, chat_id: ChatId, text: String) -> ApiResult<ChatMessage>;
    async fn mark_as_read(&self, chat_id: ChatId) -> ApiResult<()>;
}

#[async_trait]
impl ChatBackend for ChatService {
    async fn start_chat(&self, peer: UserId) -> ApiResult<Chat> {
        ChatService::start_chat(self, peer).await
    }

    async fn messages(&self, chat_id: ChatId, page: u32) -> ApiResult<MessagePage> {
        ChatService::messages(self, chat_id, page).await
    }

    async fn send_text(&self, chat_id: ChatId, text: String) -> ApiResult<ChatMessage> {
        self.send_message(chat_id, SendMessageRequest::text(text)).await
    }

    async fn mark_as_read(&self, chat_id: ChatId) -> ApiResult<()> {
        ChatService::mark_as_read(self, chat_id).await
    }
}

/// Channel subscriptions as seen by one chat view.
#[async_trait]
pub trait LiveFeed: Send + Sync {
    async fn subscribe(&self, channel: &str) -> LiveResult<mpsc::Receiver<LiveEvent>>;
    async fn unsubscribe(&self, channel: &str);
}

#[async_trait]
impl LiveFeed for LiveHandle {
    async fn subscribe(&self, channel: &str) -> LiveResult<mpsc::Receiver<LiveEvent>> {
        LiveHandle::subscribe(self, channel).await
    }

    async fn unsubscribe(&self, channel: &str) {
        if let Err(e) = LiveHandle::unsubscribe(self, channel).await {
            tracing::debug!(channel, error = %e, "Live client already stopped");
        }
    }
}
