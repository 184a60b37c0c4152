//! Events pushed from background tasks to whatever renders the view.

use tokio::sync::mpsc;

use aqar_shared::MessageId;

use crate::chat::ChatPhase;

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A toast-style message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    PhaseChanged(ChatPhase),
    /// The message list changed; the view should jump to the newest entry.
    ScrollToLatest { last: Option<MessageId> },
    DraftChanged(String),
}

/// Send an event to the view, logging if nobody is listening anymore.
pub fn emit_event(tx: &mpsc::UnboundedSender<ViewEvent>, event: ViewEvent) {
    if let Err(e) = tx.send(event) {
        tracing::debug!(event = ?e.0, "View dropped, event discarded");
    }
}
