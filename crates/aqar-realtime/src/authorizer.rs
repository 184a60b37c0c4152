use async_trait::async_trait;

use aqar_api::services::ChannelAuthService;

use crate::error::{LiveError, Result};

/// Signature returned by the backend for one `(socket, channel)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSignature {
    pub auth: String,
    pub channel_data: Option<String>,
}

/// Signs subscriptions to private channels.
#[async_trait]
pub trait ChannelAuthorizer: Send + Sync {
    async fn authorize(&self, socket_id: &str, channel: &str) -> Result<ChannelSignature>;
}

#[async_trait]
impl ChannelAuthorizer for ChannelAuthService {
    async fn authorize(&self, socket_id: &str, channel: &str) -> Result<ChannelSignature> {
        let signed = ChannelAuthService::authorize(self, socket_id, channel)
            .await
            .map_err(|e| LiveError::Authorization {
                channel: channel.to_string(),
                reason: e.to_string(),
            })?;
        Ok(ChannelSignature {
            auth: signed.auth,
            channel_data: signed.channel_data,
        })
    }
}
