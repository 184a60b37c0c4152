use thiserror::Error;

/// Errors raised by the live channel client.
#[derive(Debug, Error)]
pub enum LiveError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed frame: {0}")]
    Protocol(String),

    #[error("Broker error {code:?}: {message}")]
    Broker { code: Option<u16>, message: String },

    #[error("Channel authorization failed for {channel}: {reason}")]
    Authorization { channel: String, reason: String },

    #[error("Connection closed before it was established")]
    NotEstablished,

    #[error("Live client is shut down")]
    Closed,
}

pub type Result<T> = std::result::Result<T, LiveError>;
