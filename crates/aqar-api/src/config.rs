//! API client configuration loaded from environment variables.
//!
//! All settings have defaults so the client starts with zero configuration
//! against a local backend.

use std::time::Duration;

use aqar_shared::Locale;

/// API client configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Backend root every relative path is appended to.
    /// Env: `AQAR_API_URL`, falling back to `NEXT_PUBLIC_API_URL`
    /// Default: `http://127.0.0.1:8000/api`
    pub base_url: String,

    /// Locale sent when neither an override nor the route path names one.
    /// Env: `AQAR_DEFAULT_LOCALE` (`ar` / `en`)
    /// Default: `ar`
    pub default_locale: Locale,

    /// Production builds skip per-request timing logs.
    /// Env: `AQAR_ENV` (`production` enables)
    /// Default: `false`
    pub production: bool,

    /// Whole-request timeout applied by the HTTP transport.
    /// Env: `AQAR_REQUEST_TIMEOUT_SECS`
    /// Default: 30 seconds
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/api".to_string(),
            default_locale: Locale::default(),
            production: false,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("AQAR_API_URL").or_else(|| lookup("NEXT_PUBLIC_API_URL")) {
            if !url.is_empty() {
                config.base_url = url;
            }
        }

        if let Some(value) = lookup("AQAR_DEFAULT_LOCALE") {
            match value.parse::<Locale>() {
                Ok(locale) => config.default_locale = locale,
                Err(e) => {
                    tracing::warn!(value = %value, error = %e, "Invalid AQAR_DEFAULT_LOCALE, using default");
                }
            }
        }

        if let Some(value) = lookup("AQAR_ENV") {
            config.production = value.eq_ignore_ascii_case("production");
        }

        if let Some(value) = lookup("AQAR_REQUEST_TIMEOUT_SECS") {
            match value.parse::<u64>() {
                Ok(secs) if secs > 0 => config.request_timeout = Duration::from_secs(secs),
                _ => {
                    tracing::warn!(value = %value, "Invalid AQAR_REQUEST_TIMEOUT_SECS, using default");
                }
            }
        }

        config
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
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.default_locale, Locale::Ar);
        assert!(!config.production);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_env_overrides() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("NEXT_PUBLIC_API_URL", "https://api.example.com"),
            ("AQAR_DEFAULT_LOCALE", "en"),
            ("AQAR_ENV", "Production"),
            ("AQAR_REQUEST_TIMEOUT_SECS", "5"),
        ]));
        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.default_locale, Locale::En);
        assert!(config.production);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_primary_url_wins_and_bad_values_fall_back() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("AQAR_API_URL", "https://primary"),
            ("NEXT_PUBLIC_API_URL", "https://secondary"),
            ("AQAR_DEFAULT_LOCALE", "fr"),
            ("AQAR_REQUEST_TIMEOUT_SECS", "0"),
        ]));
        assert_eq!(config.base_url, "https://primary");
        assert_eq!(config.default_locale, Locale::Ar);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }
}
