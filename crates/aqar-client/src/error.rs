use thiserror::Error;

use aqar_api::ApiError;
use aqar_realtime::LiveError;

/// Errors surfaced by the chat view and its handle.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Chat view is closed")]
    Closed,

    #[error("Could not start chat: {0}")]
    Start(#[source] ApiError),

    #[error("Live channel unavailable: {0}")]
    Live(#[from] LiveError),
}

pub type Result<T> = std::result::Result<T, ChatError>;
