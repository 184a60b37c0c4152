//! Live channel client speaking the Pusher WebSocket protocol.
//!
//! [`spawn_live_client`] runs the connection in a background task; callers
//! subscribe to channels through the returned [`LiveHandle`].

pub mod authorizer;
pub mod client;
pub mod config;
pub mod error;
pub mod protocol;

pub use authorizer::{ChannelAuthorizer, ChannelSignature};
pub use client::{spawn_live_client, LiveCommand, LiveHandle, LiveNotification};
pub use config::LiveConfig;
pub use error::{LiveError, Result};
pub use protocol::LiveEvent;
