//! What a chat view renders at any moment.

use aqar_shared::chat::ChatMessage;
use aqar_shared::{ChatId, UserId};

use super::buffer::MessageBuffer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatPhase {
    Idle,
    /// Start/resume request in flight.
    Starting,
    Active { chat_id: ChatId },
    /// Start failed. Terminal for this view.
    Failed { reason: String },
    Closed,
    /// No peer to talk to.
    NoContact,
    /// Peer is the signed-in user.
    SelfChat,
    /// Nobody is signed in; the view offers a login link instead.
    Anonymous,
}

impl ChatPhase {
    /// Decided before any network call from the two identities.
    pub fn initial(current_user: Option<UserId>, peer: Option<UserId>) -> Self {
        match (current_user, peer) {
            (_, None) => ChatPhase::NoContact,
            (None, Some(_)) => ChatPhase::Anonymous,
            (Some(me), Some(peer)) if me == peer => ChatPhase::SelfChat,
            (Some(_), Some(_)) => ChatPhase::Idle,
        }
    }

    pub fn chat_id(&self) -> Option<ChatId> {
        match self {
            ChatPhase::Active { chat_id } => Some(*chat_id),
            _ => None,
        }
    }

    /// No further transitions except to `Closed`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChatPhase::Failed { .. }
                | ChatPhase::Closed
                | ChatPhase::NoContact
                | ChatPhase::SelfChat
                | ChatPhase::Anonymous
        )
    }
}

/// Snapshot published after every state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatView {
    pub phase: ChatPhase,
    pub buffer: MessageBuffer,
    pub draft: String,
    pub sending: bool,
    pub loading_history: bool,
    pub current_user: Option<UserId>,
}

impl ChatView {
    pub fn new(current_user: Option<UserId>, peer: Option<UserId>) -> Self {
        Self {
            phase: ChatPhase::initial(current_user, peer),
            buffer: MessageBuffer::new(),
            draft: String::new(),
            sending: false,
            loading_history: false,
            current_user,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.buffer.messages()
    }

    /// Whether `message` should render on the signed-in user's side.
    pub fn is_own(&self, message: &ChatMessage) -> bool {
        self.current_user.is_some_and(|me| message.is_from(me))
    }

    pub fn is_loading(&self) -> bool {
        self.phase == ChatPhase::Starting || self.loading_history
    }

    pub fn can_send(&self) -> bool {
        self.phase.chat_id().is_some() && !self.draft.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_phase_guards() {
        assert_eq!(ChatPhase::initial(Some(UserId(7)), None), ChatPhase::NoContact);
        assert_eq!(ChatPhase::initial(None, None), ChatPhase::NoContact);
        assert_eq!(ChatPhase::initial(None, Some(UserId(9))), ChatPhase::Anonymous);
        assert_eq!(ChatPhase::initial(Some(UserId(7)), Some(UserId(7))), ChatPhase::SelfChat);
        assert_eq!(ChatPhase::initial(Some(UserId(7)), Some(UserId(9))), ChatPhase::Idle);
    }

    #[test]
    fn send_needs_active_chat_and_text() {
        let mut view = ChatView::new(Some(UserId(7)), Some(UserId(9)));
        view.draft = "hello".into();
        assert!(!view.can_send());
        view.phase = ChatPhase::Active { chat_id: ChatId(42) };
        assert!(view.can_send());
        view.draft = "   ".into();
        assert!(!view.can_send());
    }
}
