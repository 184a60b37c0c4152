//! Live channel client with tokio mpsc command/notification pattern.
//!
//! A background task owns the WebSocket, reconnects with backoff, and
//! re-subscribes every known channel after each `connection_established`.
//! Each subscriber receives its channel's events on its own mpsc receiver.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::authorizer::ChannelAuthorizer;
use crate::config::LiveConfig;
use crate::error::{LiveError, Result};
use crate::protocol::{parse_inbound, requires_auth, Inbound, LiveEvent, Outbound, DEFAULT_ACTIVITY_TIMEOUT};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;

const EVENT_BUFFER: usize = 64;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Commands sent *into* the live task.
#[derive(Debug)]
pub enum LiveCommand {
    /// Start forwarding a channel's events to `events`. Replaces any
    /// previous subscriber of the same channel.
    Subscribe {
        channel: String,
        events: mpsc::Sender<LiveEvent>,
    },
    Unsubscribe(String),
    Shutdown,
}

/// Connection lifecycle notifications sent *from* the live task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveNotification {
    Connected { socket_id: String },
    Disconnected { reason: String },
    Subscribed { channel: String },
    SubscriptionFailed { channel: String, reason: String },
}

/// Cloneable sender side of the live task.
#[derive(Debug, Clone)]
pub struct LiveHandle {
    cmd_tx: mpsc::Sender<LiveCommand>,
}

impl LiveHandle {
    pub async fn subscribe(&self, channel: impl Into<String>) -> Result<mpsc::Receiver<LiveEvent>> {
        let (events, rx) = mpsc::channel(EVENT_BUFFER);
        self.cmd_tx
            .send(LiveCommand::Subscribe {
                channel: channel.into(),
                events,
            })
            .await
            .map_err(|_| LiveError::Closed)?;
        Ok(rx)
    }

    pub async fn unsubscribe(&self, channel: impl Into<String>) -> Result<()> {
        self.cmd_tx
            .send(LiveCommand::Unsubscribe(channel.into()))
            .await
            .map_err(|_| LiveError::Closed)
    }

    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(LiveCommand::Shutdown).await;
    }
}

/// Spawn the live client in a background tokio task.
///
/// Returns the command handle and the notification receiver. The task
/// connects on its own and keeps reconnecting until shut down or until
/// every handle is dropped.
pub fn spawn_live_client(
    config: LiveConfig,
    authorizer: Arc<dyn ChannelAuthorizer>,
) -> (LiveHandle, mpsc::Receiver<LiveNotification>) {
    let (cmd_tx, cmd_rx) = mpsc::channel::<LiveCommand>(256);
    let (notif_tx, notif_rx) = mpsc::channel::<LiveNotification>(256);

    let task = LiveTask {
        config,
        authorizer,
        cmd_rx,
        notif_tx,
        subscribers: HashMap::new(),
    };
    tokio::spawn(task.run());

    (LiveHandle { cmd_tx }, notif_rx)
}

enum SessionEnd {
    Shutdown,
    Disconnected(String),
}

struct LiveTask {
    config: LiveConfig,
    authorizer: Arc<dyn ChannelAuthorizer>,
    cmd_rx: mpsc::Receiver<LiveCommand>,
    notif_tx: mpsc::Sender<LiveNotification>,
    subscribers: HashMap<String, mpsc::Sender<LiveEvent>>,
}

impl LiveTask {
    async fn run(mut self) {
        let url = self.config.socket_url();
        let mut backoff = INITIAL_BACKOFF;

        loop {
            match connect_async(url.as_str()).await {
                Ok((ws, _response)) => {
                    debug!(url = %url, "Live socket open");
                    match self.session(ws).await {
                        SessionEnd::Shutdown => break,
                        SessionEnd::Disconnected(reason) => {
                            warn!(reason = %reason, "Live connection lost");
                            self.notify(LiveNotification::Disconnected { reason });
                            backoff = INITIAL_BACKOFF;
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, retry_in = ?backoff, "Live connection failed");
                }
            }

            if self.wait_offline(backoff).await {
                break;
            }
            backoff = (backoff * 2).min(self.config.max_backoff);
        }

        info!("Live client stopped");
    }

    /// Keep serving commands while disconnected. Returns `true` on shutdown.
    async fn wait_offline(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return false,
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(LiveCommand::Subscribe { channel, events }) => {
                        self.subscribers.insert(channel, events);
                    }
                    Some(LiveCommand::Unsubscribe(channel)) => {
                        self.subscribers.remove(&channel);
                    }
                    Some(LiveCommand::Shutdown) | None => return true,
                },
            }
        }
    }

    async fn session(&mut self, ws: WebSocketStream<MaybeTlsStream<TcpStream>>) -> SessionEnd {
        let (mut write, mut read) = ws.split();
        let mut socket_id: Option<String> = None;
        let mut activity_timeout = DEFAULT_ACTIVITY_TIMEOUT;
        let mut deadline = Instant::now() + activity_timeout;
        let mut awaiting_pong = false;

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(LiveCommand::Subscribe { channel, events }) => {
                        self.subscribers.insert(channel.clone(), events);
                        if let Some(id) = socket_id.as_deref() {
                            self.subscribe(&mut write, id, channel).await;
                        }
                    }
                    Some(LiveCommand::Unsubscribe(channel)) => {
                        if self.subscribers.remove(&channel).is_some() && socket_id.is_some() {
                            debug!(channel = %channel, "Unsubscribing");
                            if let Err(e) = send_frame(&mut write, &Outbound::Unsubscribe { channel }).await {
                                return SessionEnd::Disconnected(e.to_string());
                            }
                        }
                    }
                    Some(LiveCommand::Shutdown) | None => {
                        info!("Live client shutdown requested");
                        let _ = write.send(WsMessage::Close(None)).await;
                        return SessionEnd::Shutdown;
                    }
                },

                msg = read.next() => match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        awaiting_pong = false;
                        deadline = Instant::now() + activity_timeout;

                        let inbound = match parse_inbound(&text) {
                            Ok(inbound) => inbound,
                            Err(e) => {
                                warn!(error = %e, "Ignoring malformed live frame");
                                continue;
                            }
                        };

                        match inbound {
                            Inbound::ConnectionEstablished { socket_id: id, activity_timeout: timeout } => {
                                info!(socket_id = %id, activity_timeout = ?timeout, "Live connection established");
                                activity_timeout = timeout;
                                deadline = Instant::now() + activity_timeout;
                                self.notify(LiveNotification::Connected { socket_id: id.clone() });

                                let channels: Vec<String> = self.subscribers.keys().cloned().collect();
                                for channel in channels {
                                    self.subscribe(&mut write, &id, channel).await;
                                }
                                socket_id = Some(id);
                            }
                            Inbound::Ping => {
                                if let Err(e) = send_frame(&mut write, &Outbound::Pong).await {
                                    return SessionEnd::Disconnected(e.to_string());
                                }
                            }
                            Inbound::Pong => {}
                            Inbound::Error { code, message } => {
                                warn!(code = ?code, message = %message, "Broker error");
                            }
                            Inbound::SubscriptionSucceeded { channel } => {
                                debug!(channel = %channel, "Subscription succeeded");
                                self.notify(LiveNotification::Subscribed { channel });
                            }
                            Inbound::SubscriptionError { channel, status } => {
                                warn!(channel = %channel, status = ?status, "Subscription rejected");
                                self.subscribers.remove(&channel);
                                self.notify(LiveNotification::SubscriptionFailed {
                                    channel,
                                    reason: format!("rejected by broker (status {status:?})"),
                                });
                            }
                            Inbound::Event(event) => {
                                if let Err(e) = self.forward(&mut write, event).await {
                                    return SessionEnd::Disconnected(e.to_string());
                                }
                            }
                        }
                    }
                    Some(Ok(WsMessage::Ping(payload))) => {
                        let _ = write.send(WsMessage::Pong(payload)).await;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        return SessionEnd::Disconnected("closed by broker".to_string());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return SessionEnd::Disconnected(e.to_string()),
                },

                _ = tokio::time::sleep_until(deadline) => {
                    if awaiting_pong {
                        return SessionEnd::Disconnected("no pong before timeout".to_string());
                    }
                    debug!("Activity timeout elapsed, pinging broker");
                    if let Err(e) = send_frame(&mut write, &Outbound::Ping).await {
                        return SessionEnd::Disconnected(e.to_string());
                    }
                    awaiting_pong = true;
                    deadline = Instant::now() + self.config.pong_timeout;
                }
            }
        }
    }

    /// Authorize if needed and send `pusher:subscribe`. Failures drop the
    /// subscriber so its receiver sees the channel close.
    async fn subscribe(&mut self, write: &mut WsSink, socket_id: &str, channel: String) {
        let outcome = self.send_subscribe(write, socket_id, &channel).await;
        if let Err(e) = outcome {
            warn!(channel = %channel, error = %e, "Failed to subscribe");
            self.subscribers.remove(&channel);
            self.notify(LiveNotification::SubscriptionFailed {
                channel,
                reason: e.to_string(),
            });
        }
    }

    async fn send_subscribe(&self, write: &mut WsSink, socket_id: &str, channel: &str) -> Result<()> {
        let (auth, channel_data) = if requires_auth(channel) {
            let signature = self.authorizer.authorize(socket_id, channel).await?;
            (Some(signature.auth), signature.channel_data)
        } else {
            (None, None)
        };
        debug!(channel = %channel, "Subscribing");
        send_frame(
            write,
            &Outbound::Subscribe {
                channel: channel.to_string(),
                auth,
                channel_data,
            },
        )
        .await
    }

    /// Deliver to the channel's subscriber. A subscriber that has gone away
    /// is unsubscribed.
    async fn forward(&mut self, write: &mut WsSink, event: LiveEvent) -> Result<()> {
        let channel = event.channel.clone();
        let gone = match self.subscribers.get(&channel) {
            Some(tx) => tx.send(event).await.is_err(),
            None => {
                debug!(channel = %channel, event = %event.event, "Event for unknown channel");
                false
            }
        };
        if gone {
            debug!(channel = %channel, "Subscriber dropped, unsubscribing");
            self.subscribers.remove(&channel);
            send_frame(write, &Outbound::Unsubscribe { channel }).await?;
        }
        Ok(())
    }

    fn notify(&self, notification: LiveNotification) {
        deliver_notification(&self.notif_tx, notification);
    }
}

/// Never blocks the live task: a full queue drops the notification.
fn deliver_notification(tx: &mpsc::Sender<LiveNotification>, notification: LiveNotification) -> bool {
    match tx.try_send(notification) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!(notification = ?dropped, "Notification queue full, dropping");
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

async fn send_frame(write: &mut WsSink, frame: &Outbound) -> Result<()> {
    write.send(WsMessage::Text(frame.to_text())).await?;
    Ok(())
}
