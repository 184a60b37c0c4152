//! Broker connection settings loaded from environment variables.

use std::time::Duration;

/// Pusher protocol revision this client speaks.
pub const PROTOCOL_VERSION: u8 = 7;

const CLIENT_NAME: &str = "aqar-rs";

#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// Application key.
    /// Env: `AQAR_PUSHER_KEY`, falling back to `NEXT_PUBLIC_PUSHER_KEY`
    pub key: String,

    /// Env: `AQAR_PUSHER_CLUSTER`, falling back to `NEXT_PUBLIC_PUSHER_CLUSTER`
    /// Default: `mt1`
    pub cluster: String,

    /// Explicit `host[:port]`, replacing `ws-{cluster}.pusher.com`.
    /// Env: `AQAR_PUSHER_HOST`
    pub host: Option<String>,

    /// Env: `AQAR_PUSHER_TLS` (`false` disables)
    /// Default: `true`
    pub use_tls: bool,

    /// Wait for a pong before treating the connection as dead.
    pub pong_timeout: Duration,

    /// Upper bound for the reconnect backoff.
    pub max_backoff: Duration,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            cluster: "mt1".to_string(),
            host: None,
            use_tls: true,
            pong_timeout: Duration::from_secs(30),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl LiveConfig {
    pub fn new(key: impl Into<String>, cluster: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            cluster: cluster.into(),
            ..Self::default()
        }
    }

    /// Plain-text connection to a local broker at `host`.
    pub fn local(key: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            host: Some(host.into()),
            use_tls: false,
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        match lookup("AQAR_PUSHER_KEY").or_else(|| lookup("NEXT_PUBLIC_PUSHER_KEY")) {
            Some(key) if !key.is_empty() => config.key = key,
            _ => tracing::warn!("AQAR_PUSHER_KEY not set, live updates will be rejected by the broker"),
        }

        if let Some(cluster) = lookup("AQAR_PUSHER_CLUSTER").or_else(|| lookup("NEXT_PUBLIC_PUSHER_CLUSTER")) {
            if !cluster.is_empty() {
                config.cluster = cluster;
            }
        }

        config.host = lookup("AQAR_PUSHER_HOST").filter(|h| !h.is_empty());

        if let Some(value) = lookup("AQAR_PUSHER_TLS") {
            match value.parse::<bool>() {
                Ok(tls) => config.use_tls = tls,
                Err(_) => tracing::warn!(value = %value, "Invalid AQAR_PUSHER_TLS, using default"),
            }
        }

        config
    }

    /// Full WebSocket URL for this application.
    pub fn socket_url(&self) -> String {
        let scheme = if self.use_tls { "wss" } else { "ws" };
        let host = self
            .host
            .clone()
            .unwrap_or_else(|| format!("ws-{}.pusher.com", self.cluster));
        format!(
            "{scheme}://{host}/app/{key}?protocol={PROTOCOL_VERSION}&client={CLIENT_NAME}&version={version}&flash=false",
            key = self.key,
            version = env!("CARGO_PKG_VERSION"),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn cluster_url() {
        let url = LiveConfig::new("abc", "eu").socket_url();
        assert!(url.starts_with("wss://ws-eu.pusher.com/app/abc?protocol=7&client=aqar-rs&version="));
    }

    #[test]
    fn host_override() {
        let config = LiveConfig::from_lookup(lookup(&[
            ("NEXT_PUBLIC_PUSHER_KEY", "k"),
            ("AQAR_PUSHER_HOST", "127.0.0.1:6001"),
            ("AQAR_PUSHER_TLS", "false"),
        ]));
        assert_eq!(config.key, "k");
        assert_eq!(config.cluster, "mt1");
        assert!(config.socket_url().starts_with("ws://127.0.0.1:6001/app/k?"));
    }

    #[test]
    fn invalid_tls_flag_keeps_default() {
        let config = LiveConfig::from_lookup(lookup(&[("AQAR_PUSHER_TLS", "maybe")]));
        assert!(config.use_tls);
    }
}
