//! Default request headers: content type, accept, locale and bearer auth.

use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION, CONTENT_TYPE,
};

use aqar_shared::Locale;

use crate::error::{ApiError, Result};

const JSON: &str = "application/json";

/// Pick the request locale: explicit override, else the route path's
/// leading segment when it names a supported locale, else the default.
pub fn resolve_locale(override_locale: Option<Locale>, route_path: Option<&str>, default: Locale) -> Locale {
    override_locale
        .or_else(|| route_path.and_then(Locale::from_route_path))
        .unwrap_or(default)
}

/// Headers every request carries. Multipart bodies get no content type so
/// the transport can write the boundary. `extra` is merged last and wins.
pub fn build_headers(
    is_multipart: bool,
    locale: Locale,
    token: Option<&str>,
    extra: &[(String, String)],
) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    if !is_multipart {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
    }
    headers.insert(ACCEPT, HeaderValue::from_static(JSON));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(locale.as_str()));

    if let Some(token) = token {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ApiError::InvalidRequest("bearer token is not a valid header value".into()))?;
        headers.insert(AUTHORIZATION, value);
    }

    for (name, value) in extra {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ApiError::InvalidRequest(format!("invalid header name {name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ApiError::InvalidRequest(format!("invalid value for header {name}: {e}")))?;
        headers.insert(name, value);
    }

    Ok(headers)
}
