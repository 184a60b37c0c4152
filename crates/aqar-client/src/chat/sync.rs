//! The task behind one mounted chat view.
//!
//! [`spawn_chat_sync`] starts (or resumes) the chat with the peer, seeds the
//! buffer from history, listens on the chat's live channel and sends the
//! user's drafts. All state lives in one task that `select!`s over user
//! commands, finished network calls and live events, so nothing mutates
//! the view concurrently. Network calls run in their own tasks and report
//! back through a completion channel; once the view is closed that channel
//! is gone and late results are dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use aqar_api::Result as ApiResult;
use aqar_realtime::{LiveEvent, Result as LiveResult};
use aqar_shared::chat::{Chat, ChatMessage, MessagePage, NewMessageEvent};
use aqar_shared::constants::EVENT_NEW_MESSAGE;
use aqar_shared::{ChatId, UserId};

use super::backend::{ChatBackend, LiveFeed};
use super::view::{ChatPhase, ChatView};
use crate::error::{ChatError, Result};
use crate::events::{emit_event, ViewEvent};
use crate::query::{MutationOptions, QueryClient, QueryKey, QueryOptions};

const HISTORY_STALE_TIME: Duration = Duration::from_secs(30);
const FIRST_PAGE: u32 = 1;

/// Shared services a chat view talks to.
#[derive(Clone)]
pub struct ChatContext {
    pub backend: Arc<dyn ChatBackend>,
    pub live: Arc<dyn LiveFeed>,
    pub queries: Arc<QueryClient>,
}

#[derive(Debug)]
pub enum ChatCommand {
    EditDraft(String),
    Send,
    Close,
}

/// User-side handle to a running chat view.
pub struct ChatHandle {
    cmd_tx: mpsc::UnboundedSender<ChatCommand>,
    view: watch::Receiver<ChatView>,
}

impl ChatHandle {
    fn command(&self, command: ChatCommand) -> Result<()> {
        self.cmd_tx.send(command).map_err(|_| ChatError::Closed)
    }

    pub fn edit_draft(&self, text: impl Into<String>) -> Result<()> {
        self.command(ChatCommand::EditDraft(text.into()))
    }

    pub fn send(&self) -> Result<()> {
        self.command(ChatCommand::Send)
    }

    /// Unmount: unsubscribe and stop. Results still in flight are ignored.
    pub fn close(&self) -> Result<()> {
        self.command(ChatCommand::Close)
    }

    pub fn view(&self) -> ChatView {
        self.view.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ChatView> {
        self.view.clone()
    }
}

enum Completion {
    Started(ApiResult<Chat>),
    History(ChatId, ApiResult<MessagePage>),
    Subscribed(ChatId, LiveResult<mpsc::Receiver<LiveEvent>>),
    Sent {
        text: String,
        outcome: ApiResult<ChatMessage>,
    },
}

/// Mount a chat view between `current_user` and `peer`.
///
/// Returns the handle, the view's event stream and the task itself.
pub fn spawn_chat_sync(
    ctx: ChatContext,
    current_user: Option<UserId>,
    peer: Option<UserId>,
) -> (ChatHandle, mpsc::UnboundedReceiver<ViewEvent>, JoinHandle<()>) {
    let view = ChatView::new(current_user, peer);
    let (view_tx, view_rx) = watch::channel(view.clone());
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (done_tx, done_rx) = mpsc::unbounded_channel();

    let sync = ChatSync {
        ctx,
        peer,
        view,
        view_tx,
        events: events_tx,
        cmd_rx,
        done_tx,
        done_rx,
        live: None,
        subscribing: None,
        pending_sends: 0,
        history_loaded: None,
        read_marked: None,
    };
    let task = tokio::spawn(sync.run());

    (ChatHandle { cmd_tx, view: view_rx }, events_rx, task)
}

struct ChatSync {
    ctx: ChatContext,
    peer: Option<UserId>,
    view: ChatView,
    view_tx: watch::Sender<ChatView>,
    events: mpsc::UnboundedSender<ViewEvent>,
    cmd_rx: mpsc::UnboundedReceiver<ChatCommand>,
    done_tx: mpsc::UnboundedSender<Completion>,
    done_rx: mpsc::UnboundedReceiver<Completion>,
    live: Option<mpsc::Receiver<LiveEvent>>,
    /// Subscribe call still in flight; aborted on close.
    subscribing: Option<JoinHandle<()>>,
    pending_sends: usize,
    history_loaded: Option<ChatId>,
    read_marked: Option<ChatId>,
}

impl ChatSync {
    async fn run(mut self) {
        emit_event(&self.events, ViewEvent::PhaseChanged(self.view.phase.clone()));
        match self.peer {
            Some(peer) if self.view.phase == ChatPhase::Idle => self.start(peer),
            _ => debug!(phase = ?self.view.phase, "Chat not started"),
        }

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(ChatCommand::EditDraft(text)) => {
                        self.view.draft = text;
                        self.publish();
                    }
                    Some(ChatCommand::Send) => self.send(),
                    Some(ChatCommand::Close) | None => break,
                },

                Some(done) = self.done_rx.recv() => self.complete(done),

                event = next_live(&mut self.live) => match event {
                    Some(event) => self.on_live_event(event),
                    None => {
                        warn!("Live channel closed, no further pushes for this chat");
                        self.live = None;
                    }
                },
            }
        }

        self.close().await;
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.view.clone());
    }

    fn set_phase(&mut self, phase: ChatPhase) {
        self.view.phase = phase.clone();
        emit_event(&self.events, ViewEvent::PhaseChanged(phase));
        self.publish();
    }

    fn buffer_changed(&self) {
        emit_event(
            &self.events,
            ViewEvent::ScrollToLatest {
                last: self.view.buffer.last_id(),
            },
        );
    }

    fn start(&mut self, peer: UserId) {
        info!(peer = %peer, "Starting chat");
        self.set_phase(ChatPhase::Starting);

        let backend = self.ctx.backend.clone();
        let queries = self.ctx.queries.clone();
        let done = self.done_tx.clone();
        tokio::spawn(async move {
            let outcome = queries
                .mutate(MutationOptions::default(), backend.start_chat(peer))
                .await;
            if outcome.is_ok() {
                queries.invalidate(&QueryKey::chats());
            }
            let _ = done.send(Completion::Started(outcome));
        });
    }

    fn complete(&mut self, done: Completion) {
        match done {
            Completion::Started(Ok(chat)) => self.bind(chat.id),
            Completion::Started(Err(e)) => {
                let reason = ChatError::Start(e).to_string();
                warn!(reason = %reason, "Chat could not be started");
                self.set_phase(ChatPhase::Failed { reason });
            }
            Completion::History(chat_id, outcome) => self.on_history(chat_id, outcome),
            Completion::Subscribed(chat_id, Ok(rx)) => {
                self.subscribing = None;
                if self.view.phase.chat_id() == Some(chat_id) {
                    debug!(chat_id = %chat_id, "Live channel attached");
                    self.live = Some(rx);
                }
            }
            Completion::Subscribed(chat_id, Err(e)) => {
                self.subscribing = None;
                let error = ChatError::Live(e);
                warn!(chat_id = %chat_id, error = %error, "Live updates disabled for this chat");
            }
            Completion::Sent { text, outcome } => self.on_sent(text, outcome),
        }
    }

    fn bind(&mut self, chat_id: ChatId) {
        info!(chat_id = %chat_id, "Chat active");
        self.set_phase(ChatPhase::Active { chat_id });
        self.fetch_history(chat_id);
        self.mark_read(chat_id);
        self.subscribe(chat_id);
    }

    fn fetch_history(&mut self, chat_id: ChatId) {
        if self.history_loaded == Some(chat_id) {
            return;
        }
        self.view.loading_history = true;
        self.publish();

        let backend = self.ctx.backend.clone();
        let queries = self.ctx.queries.clone();
        let done = self.done_tx.clone();
        tokio::spawn(async move {
            let key = QueryKey::messages(chat_id).with(FIRST_PAGE);
            let outcome = queries
                .fetch_query(key, QueryOptions::stale_after(HISTORY_STALE_TIME), move || {
                    let backend = backend.clone();
                    async move { backend.messages(chat_id, FIRST_PAGE).await }
                })
                .await;
            let _ = done.send(Completion::History(chat_id, outcome));
        });
    }

    fn on_history(&mut self, chat_id: ChatId, outcome: ApiResult<MessagePage>) {
        if self.view.phase.chat_id() != Some(chat_id) {
            return;
        }
        self.view.loading_history = false;
        match outcome {
            Ok(page) => {
                self.history_loaded = Some(chat_id);
                // Pushes that beat the history fetch stay, after the page.
                let early = self.view.buffer.messages().to_vec();
                self.view.buffer.seed(page.into_chronological());
                for message in early {
                    self.view.buffer.push_if_absent(message);
                }
                debug!(chat_id = %chat_id, count = self.view.buffer.len(), "History loaded");
                self.publish();
                self.buffer_changed();
            }
            Err(e) => {
                warn!(chat_id = %chat_id, error = %e, "History unavailable");
                self.publish();
            }
        }
    }

    /// Best effort, once per bound chat. Failures are logged only.
    fn mark_read(&mut self, chat_id: ChatId) {
        if self.read_marked == Some(chat_id) {
            return;
        }
        self.read_marked = Some(chat_id);

        let backend = self.ctx.backend.clone();
        let queries = self.ctx.queries.clone();
        tokio::spawn(async move {
            match queries
                .mutate(MutationOptions::quiet(), backend.mark_as_read(chat_id))
                .await
            {
                Ok(()) => {
                    queries.invalidate(&QueryKey::chats());
                    queries.invalidate(&QueryKey::unread_count());
                }
                Err(e) => debug!(chat_id = %chat_id, error = %e, "Mark as read failed"),
            }
        });
    }

    fn subscribe(&mut self, chat_id: ChatId) {
        let live = self.ctx.live.clone();
        let done = self.done_tx.clone();
        self.subscribing = Some(tokio::spawn(async move {
            let outcome = live.subscribe(&chat_id.to_channel()).await;
            let _ = done.send(Completion::Subscribed(chat_id, outcome));
        }));
    }

    fn on_live_event(&mut self, event: LiveEvent) {
        if event.event != EVENT_NEW_MESSAGE {
            debug!(channel = %event.channel, event = %event.event, "Ignoring live event");
            return;
        }
        let payload: NewMessageEvent = match serde_json::from_value(event.data) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(channel = %event.channel, error = %e, "Malformed new-message payload");
                return;
            }
        };
        let id = payload.message.id;
        if self.view.buffer.push_if_absent(payload.message) {
            debug!(message_id = %id, "Live message appended");
            self.publish();
            self.buffer_changed();
        } else {
            debug!(message_id = %id, "Duplicate live message dropped");
        }
    }

    fn send(&mut self) {
        let Some(chat_id) = self.view.phase.chat_id() else {
            debug!("Send ignored, no active chat");
            return;
        };
        if self.view.draft.trim().is_empty() {
            return;
        }

        let text = std::mem::take(&mut self.view.draft);
        self.pending_sends += 1;
        self.view.sending = true;
        emit_event(&self.events, ViewEvent::DraftChanged(String::new()));
        self.publish();

        let backend = self.ctx.backend.clone();
        let queries = self.ctx.queries.clone();
        let done = self.done_tx.clone();
        tokio::spawn(async move {
            let outcome = queries
                .mutate(MutationOptions::default(), backend.send_text(chat_id, text.clone()))
                .await;
            if outcome.is_ok() {
                queries.invalidate(&QueryKey::messages(chat_id));
                queries.invalidate(&QueryKey::chats());
            }
            let _ = done.send(Completion::Sent { text, outcome });
        });
    }

    fn on_sent(&mut self, text: String, outcome: ApiResult<ChatMessage>) {
        self.pending_sends = self.pending_sends.saturating_sub(1);
        self.view.sending = self.pending_sends > 0;
        match outcome {
            Ok(message) => {
                let id = message.id;
                if self.view.buffer.push_if_absent(message) {
                    info!(message_id = %id, "Message sent");
                    self.publish();
                    self.buffer_changed();
                } else {
                    debug!(message_id = %id, "Sent message already delivered live");
                    self.publish();
                }
            }
            Err(e) => {
                warn!(error = %e, "Send failed, restoring draft");
                self.view.draft = text.clone();
                emit_event(&self.events, ViewEvent::DraftChanged(text));
                self.publish();
            }
        }
    }

    async fn close(&mut self) {
        // The unsubscribe must not overtake a subscribe still in flight.
        if let Some(task) = self.subscribing.take() {
            task.abort();
            let _ = task.await;
        }
        if let Some(chat_id) = self.view.phase.chat_id() {
            self.ctx.live.unsubscribe(&chat_id.to_channel()).await;
            info!(chat_id = %chat_id, "Chat closed");
        }
        self.live = None;
        self.set_phase(ChatPhase::Closed);
    }
}

async fn next_live(live: &mut Option<mpsc::Receiver<LiveEvent>>) -> Option<LiveEvent> {
    match live {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
