//! Application state shared by every CLI command.
//!
//! [`AppState`] owns the API client and the services built on it, the
//! query cache for this process, and (once connected) the live channel
//! handle. Chat views borrow what they need through [`AppState::chat_context`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{info, warn};

use aqar_api::services::{AuthService, ChannelAuthService, ChatService};
use aqar_api::{ApiClient, ApiConfig, Result as ApiResult};
use aqar_realtime::{
    spawn_live_client, LiveConfig, LiveError, LiveEvent, LiveHandle, LiveNotification, Result as LiveResult,
};
use aqar_shared::UserId;
use aqar_store::{AuthStore, Database};

use crate::chat::{ChatContext, LiveFeed};
use crate::query::{ErrorPresenter, QueryClient};

/// Central application state.
pub struct AppState {
    pub api: ApiClient,
    pub auth: AuthService,
    pub chats: ChatService,
    pub queries: Arc<QueryClient>,

    /// `None` until [`AppState::connect_live`] runs, or when no Pusher key
    /// is configured.
    pub live: Option<LiveHandle>,
}

impl AppState {
    pub fn open(db: Database, config: ApiConfig, presenter: ErrorPresenter) -> ApiResult<Self> {
        let auth_store = Arc::new(AuthStore::open(db.into_shared())?);
        let api = ApiClient::new(config, auth_store)?;
        Ok(Self {
            auth: AuthService::new(api.clone()),
            chats: ChatService::new(api.clone()),
            queries: Arc::new(QueryClient::new(presenter)),
            api,
            live: None,
        })
    }

    /// The signed-in user as last cached on disk.
    pub fn current_user(&self) -> ApiResult<Option<UserId>> {
        Ok(self.api.auth().stored_user()?.map(|user| user.id))
    }

    /// Start the live client. Without a key the chat falls back to
    /// request/response only.
    pub fn connect_live(&mut self, config: LiveConfig) -> Option<mpsc::Receiver<LiveNotification>> {
        if config.key.is_empty() {
            warn!("No Pusher key configured, live updates disabled");
            return None;
        }
        info!(url = %config.socket_url(), "Connecting live channel");
        let authorizer = Arc::new(ChannelAuthService::new(self.api.clone()));
        let (handle, notifications) = spawn_live_client(config, authorizer);
        self.live = Some(handle);
        Some(notifications)
    }

    pub fn chat_context(&self) -> ChatContext {
        let live: Arc<dyn LiveFeed> = match &self.live {
            Some(handle) => Arc::new(handle.clone()),
            None => Arc::new(NoLiveFeed),
        };
        ChatContext {
            backend: Arc::new(self.chats.clone()),
            live,
            queries: self.queries.clone(),
        }
    }

    pub async fn shutdown(&self) {
        if let Some(live) = &self.live {
            live.shutdown().await;
        }
    }
}

/// Stand-in feed when the live client is not running.
struct NoLiveFeed;

#[async_trait]
impl LiveFeed for NoLiveFeed {
    async fn subscribe(&self, _channel: &str) -> LiveResult<mpsc::Receiver<LiveEvent>> {
        Err(LiveError::Closed)
    }

    async fn unsubscribe(&self, _channel: &str) {}
}

#[cfg(test)]
mod tests {
    use aqar_store::StoredUser;

    use super::*;

    fn state() -> AppState {
        let db = Database::open_in_memory().unwrap();
        AppState::open(db, ApiConfig::new("http://127.0.0.1:1"), ErrorPresenter::silent()).unwrap()
    }

    #[test]
    fn current_user_comes_from_the_cached_profile() {
        let state = state();
        assert_eq!(state.current_user().unwrap(), None);

        state.api.auth().store_user(&StoredUser::new(UserId(7), "Sara")).unwrap();
        assert_eq!(state.current_user().unwrap(), Some(UserId(7)));
    }

    #[test]
    fn session_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aqar.db");
        let config = ApiConfig::new("http://127.0.0.1:1");

        let first = AppState::open(Database::open_at(&path).unwrap(), config.clone(), ErrorPresenter::silent()).unwrap();
        first.api.auth().persist_login("tok", Some(&StoredUser::new(UserId(7), "Sara"))).unwrap();
        drop(first);

        let second = AppState::open(Database::open_at(&path).unwrap(), config, ErrorPresenter::silent()).unwrap();
        assert_eq!(second.current_user().unwrap(), Some(UserId(7)));
        assert_eq!(second.api.token().unwrap().as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn live_needs_a_key() {
        let mut state = state();
        assert!(state.connect_live(LiveConfig::new("", "mt1")).is_none());
        assert!(state.live.is_none());

        let ctx = state.chat_context();
        assert!(matches!(ctx.live.subscribe("private-chat.1").await, Err(LiveError::Closed)));
    }
}
