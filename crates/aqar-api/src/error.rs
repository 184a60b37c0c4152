use std::collections::BTreeMap;

use thiserror::Error;

use aqar_shared::constants::UNAUTHORIZED_MESSAGE;
use aqar_store::StoreError;

/// Field name → validation messages, as the backend's `errors` map.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Every failure the API client can report. The wire envelope never leaks
/// past this type.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP 401. Persisted auth state has already been cleared.
    #[error("{}", UNAUTHORIZED_MESSAGE)]
    Unauthorized,

    /// Non-2xx JSON response, or a 2xx whose body says `success: false`.
    #[error("{message}")]
    Api {
        status: u16,
        message: String,
        details: Option<FieldErrors>,
    },

    /// Non-2xx response with a body that is not JSON.
    #[error("Server returned {status}: {snippet}")]
    NonJson { status: u16, snippet: String },

    /// No response at all (connect failure, timeout, TLS, …).
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// The body did not have the shape the caller asked for.
    #[error("Unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),

    /// The caller's cancellation token fired first.
    #[error("Request cancelled")]
    Cancelled,

    /// Reading or clearing persisted credentials failed.
    #[error("Client state error: {0}")]
    Storage(#[from] StoreError),

    /// The request could not be built (bad URL, header or mime type).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// HTTP status, for errors that came with a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized => Some(401),
            ApiError::Api { status, .. } | ApiError::NonJson { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    pub fn is_forbidden(&self) -> bool {
        self.status() == Some(403)
    }

    /// A 4xx carrying a field-level error map.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ApiError::Api { status: 400..=499, details: Some(d), .. } if !d.is_empty()
        )
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            ApiError::Api { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    /// Whether the failure happened before any response arrived.
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ApiError>;
