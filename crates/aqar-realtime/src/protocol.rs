//! Pusher wire frames.
//!
//! Every frame is a JSON object with an `event` name, an optional
//! `channel`, and a `data` field. The broker double-encodes `data` as a
//! JSON string; outbound frames send it as a plain object.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{LiveError, Result};

pub const CONNECTION_ESTABLISHED: &str = "pusher:connection_established";
pub const ERROR: &str = "pusher:error";
pub const PING: &str = "pusher:ping";
pub const PONG: &str = "pusher:pong";
pub const SUBSCRIBE: &str = "pusher:subscribe";
pub const UNSUBSCRIBE: &str = "pusher:unsubscribe";
pub const SUBSCRIPTION_SUCCEEDED: &str = "pusher_internal:subscription_succeeded";
pub const SUBSCRIPTION_ERROR: &str = "pusher:subscription_error";

/// Used when the broker omits `activity_timeout`.
pub const DEFAULT_ACTIVITY_TIMEOUT: Duration = Duration::from_secs(120);

/// An application event delivered on a subscribed channel.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveEvent {
    pub channel: String,
    pub event: String,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    ConnectionEstablished {
        socket_id: String,
        activity_timeout: Duration,
    },
    Ping,
    Pong,
    Error {
        code: Option<u16>,
        message: String,
    },
    SubscriptionSucceeded {
        channel: String,
    },
    SubscriptionError {
        channel: String,
        status: Option<u16>,
    },
    Event(LiveEvent),
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct EstablishedData {
    socket_id: String,
    #[serde(default)]
    activity_timeout: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorData {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<u16>,
}

/// String-encoded payloads are decoded; anything that is not JSON stays a
/// plain string.
fn decode_data(data: Value) -> Value {
    match data {
        Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        other => other,
    }
}

pub fn parse_inbound(text: &str) -> Result<Inbound> {
    let frame: RawFrame = serde_json::from_str(text)?;
    let data = decode_data(frame.data);

    let inbound = match frame.event.as_str() {
        CONNECTION_ESTABLISHED => {
            let established: EstablishedData = serde_json::from_value(data)?;
            Inbound::ConnectionEstablished {
                socket_id: established.socket_id,
                activity_timeout: established
                    .activity_timeout
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_ACTIVITY_TIMEOUT),
            }
        }
        PING => Inbound::Ping,
        PONG => Inbound::Pong,
        ERROR => {
            let error: ErrorData = serde_json::from_value(data).unwrap_or_default();
            Inbound::Error {
                code: error.code,
                message: error.message.unwrap_or_default(),
            }
        }
        SUBSCRIPTION_SUCCEEDED => Inbound::SubscriptionSucceeded {
            channel: required_channel(frame.channel, &frame.event)?,
        },
        SUBSCRIPTION_ERROR => {
            let error: ErrorData = serde_json::from_value(data).unwrap_or_default();
            Inbound::SubscriptionError {
                channel: required_channel(frame.channel, &frame.event)?,
                status: error.status,
            }
        }
        _ => Inbound::Event(LiveEvent {
            channel: required_channel(frame.channel, &frame.event)?,
            event: frame.event,
            data,
        }),
    };
    Ok(inbound)
}

fn required_channel(channel: Option<String>, event: &str) -> Result<String> {
    channel.ok_or_else(|| LiveError::Protocol(format!("{event} frame without a channel")))
}

/// Frames the client sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Subscribe {
        channel: String,
        auth: Option<String>,
        channel_data: Option<String>,
    },
    Unsubscribe {
        channel: String,
    },
    Ping,
    Pong,
}

impl Outbound {
    pub fn to_text(&self) -> String {
        let (event, data) = match self {
            Outbound::Subscribe {
                channel,
                auth,
                channel_data,
            } => {
                let mut data = json!({ "channel": channel });
                if let Some(auth) = auth {
                    data["auth"] = Value::String(auth.clone());
                }
                if let Some(channel_data) = channel_data {
                    data["channel_data"] = Value::String(channel_data.clone());
                }
                (SUBSCRIBE, data)
            }
            Outbound::Unsubscribe { channel } => (UNSUBSCRIBE, json!({ "channel": channel })),
            Outbound::Ping => (PING, json!({})),
            Outbound::Pong => (PONG, json!({})),
        };
        json!({ "event": event, "data": data }).to_string()
    }
}

/// Private and presence channels need a signature before subscribing.
pub fn requires_auth(channel: &str) -> bool {
    channel.starts_with("private-") || channel.starts_with("presence-")
}
