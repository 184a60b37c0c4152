//! Handlers behind the `aqar-chat` subcommands.

pub mod auth;
pub mod chat;
pub mod chats;
