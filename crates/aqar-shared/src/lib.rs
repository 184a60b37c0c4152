//! Types shared by every Aqar crate: backend identifiers, chat models,
//! supported locales and wire-level constants.

pub mod chat;
pub mod constants;
pub mod error;
pub mod locale;
pub mod types;

pub use error::SharedError;
pub use locale::Locale;
pub use types::{ChatId, MessageId, UserId};
