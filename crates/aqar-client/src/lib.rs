//! Client-side chat for the Aqar marketplace.
//!
//! [`chat::spawn_chat_sync`] runs one chat view against the REST API and
//! the live channel. [`query::QueryClient`] is the per-process cache and
//! retry layer the view's requests go through, and [`state::AppState`]
//! wires both to persisted credentials.

pub mod chat;
pub mod commands;
pub mod error;
pub mod events;
pub mod query;
pub mod state;

pub use error::{ChatError, Result};
pub use state::AppState;
