//! Signs private live-channel subscriptions.

use serde::{Deserialize, Serialize};

use aqar_shared::constants::CHANNEL_AUTH_PATH;

use crate::client::{ApiClient, RequestOptions};
use crate::error::Result;

#[derive(Debug, Clone, Serialize)]
struct ChannelAuthRequest<'a> {
    socket_id: &'a str,
    channel_name: &'a str,
}

/// Signature the broker expects in `pusher:subscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAuth {
    pub auth: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_data: Option<String>,
}

#[derive(Clone)]
pub struct ChannelAuthService {
    api: ApiClient,
}

impl ChannelAuthService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn authorize(&self, socket_id: &str, channel_name: &str) -> Result<ChannelAuth> {
        let body = serde_json::to_value(ChannelAuthRequest {
            socket_id,
            channel_name,
        })?;
        self.api
            .post(CHANNEL_AUTH_PATH, body, RequestOptions::default())
            .await
    }
}
