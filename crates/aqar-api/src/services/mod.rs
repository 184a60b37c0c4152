pub mod auth;
pub mod channel_auth;
pub mod chat;

pub use auth::{AuthService, AuthSession, LoginRequest, RegisterRequest};
pub use channel_auth::{ChannelAuth, ChannelAuthService};
pub use chat::{ChatService, SendMessageRequest};
