//! Chat synchronization for one mounted view.

pub mod backend;
pub mod buffer;
pub mod sync;
pub mod view;

pub use backend::{ChatBackend, LiveFeed};
pub use buffer::MessageBuffer;
pub use sync::{spawn_chat_sync, ChatCommand, ChatContext, ChatHandle};
pub use view::{ChatPhase, ChatView};
