//! The single chokepoint for every backend call.
//!
//! [`ApiClient`] prefixes the configured base URL, injects locale and
//! bearer headers, picks JSON or multipart encoding from the body, and
//! turns the response into either the unwrapped payload or an
//! [`ApiError`]. A 401 clears persisted auth state before anything else
//! looks at the response.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use aqar_shared::constants::NON_JSON_SNIPPET_LEN;
use aqar_shared::Locale;
use aqar_store::AuthStore;

use crate::body::RequestBody;
use crate::config::ApiConfig;
use crate::envelope::Envelope;
use crate::error::{ApiError, Result};
use crate::headers::{build_headers, resolve_locale};
use crate::query::QueryParams;

/// Per-call overrides.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Merged after the defaults; same-named defaults are replaced.
    pub headers: Vec<(String, String)>,
    /// Forces `Accept-Language`.
    pub locale: Option<Locale>,
    /// Abandons the request when cancelled.
    pub cancel: Option<CancellationToken>,
}

impl RequestOptions {
    pub fn locale(locale: Locale) -> Self {
        Self {
            locale: Some(locale),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// A successful response after envelope handling.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// Unwrapped JSON payload.
    Json(Value),
    /// Body of a 2xx response that was not JSON.
    Text(String),
}

impl ApiResponse {
    /// Decode into `T`. Text bodies decode as a JSON string, so `String`
    /// and `Value` targets accept them.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T> {
        let value = match self {
            ApiResponse::Json(value) => value,
            ApiResponse::Text(text) => Value::String(text),
        };
        Ok(serde_json::from_value(value)?)
    }
}

struct Inner {
    http: reqwest::Client,
    config: ApiConfig,
    auth: Arc<AuthStore>,
    route_path: RwLock<Option<String>>,
}

/// Cheap to clone; clones share the transport and auth store.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl ApiClient {
    pub fn new(config: ApiConfig, auth: Arc<AuthStore>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_http(http, config, auth))
    }

    pub fn with_http(http: reqwest::Client, config: ApiConfig, auth: Arc<AuthStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                config,
                auth,
                route_path: RwLock::new(None),
            }),
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    pub fn auth(&self) -> &Arc<AuthStore> {
        &self.inner.auth
    }

    /// Record the route the user is on; its leading segment picks the
    /// request locale when no override is given.
    pub fn set_route_path(&self, path: impl Into<String>) {
        if let Ok(mut route) = self.inner.route_path.write() {
            *route = Some(path.into());
        }
    }

    /// Locale a request with `override_locale` would be sent with.
    pub fn current_locale(&self, override_locale: Option<Locale>) -> Locale {
        let route = self.inner.route_path.read().ok().and_then(|r| r.clone());
        resolve_locale(override_locale, route.as_deref(), self.inner.config.default_locale)
    }

    /// Bearer token the next request would carry.
    pub fn token(&self) -> Result<Option<String>> {
        Ok(self.inner.auth.token()?)
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: QueryParams,
        options: RequestOptions,
    ) -> Result<T> {
        self.send(Method::GET, path, Some(&params), RequestBody::Empty, options)
            .await?
            .decode()
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: impl Into<RequestBody>,
        options: RequestOptions,
    ) -> Result<T> {
        self.send(Method::POST, path, None, body.into(), options)
            .await?
            .decode()
    }

    pub async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        body: impl Into<RequestBody>,
        options: RequestOptions,
    ) -> Result<T> {
        self.send(Method::PUT, path, None, body.into(), options)
            .await?
            .decode()
    }

    pub async fn patch<T: DeserializeOwned>(
        &self,
        path: &str,
        body: impl Into<RequestBody>,
        options: RequestOptions,
    ) -> Result<T> {
        self.send(Method::PATCH, path, None, body.into(), options)
            .await?
            .decode()
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        body: impl Into<RequestBody>,
        options: RequestOptions,
    ) -> Result<T> {
        self.send(Method::DELETE, path, None, body.into(), options)
            .await?
            .decode()
    }

    /// Issue a request and apply the response rules, without decoding the
    /// payload into a concrete type.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        params: Option<&QueryParams>,
        body: RequestBody,
        options: RequestOptions,
    ) -> Result<ApiResponse> {
        let url = self.build_url(path, params)?;
        let locale = self.current_locale(options.locale);
        let token = self.token()?;
        let headers = build_headers(body.is_multipart(), locale, token.as_deref(), &options.headers)?;

        let mut request = self.inner.http.request(method.clone(), url).headers(headers);
        if method != Method::GET {
            request = match body {
                RequestBody::Empty => request,
                RequestBody::Json(value) => request.body(serde_json::to_vec(&value)?),
                RequestBody::Multipart(form) => request.multipart(form.into_multipart()?),
            };
        }

        let started = Instant::now();
        let outcome = match options.cancel {
            Some(cancel) => tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(%method, path, "request cancelled");
                    return Err(ApiError::Cancelled);
                }
                outcome = request.send() => outcome,
            },
            None => request.send().await,
        };

        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                error!(%method, path, error = %e, "API request failed before a response arrived");
                return Err(ApiError::Transport(e));
            }
        };

        let status = response.status().as_u16();
        if !self.inner.config.production {
            debug!(
                %method,
                path,
                status,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "API request"
            );
        }

        if status == 401 {
            self.handle_unauthorized();
            return Err(ApiError::Unauthorized);
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"));

        let text = response.text().await?;

        if !is_json {
            if !(200..300).contains(&status) {
                return Err(ApiError::NonJson {
                    status,
                    snippet: text.chars().take(NON_JSON_SNIPPET_LEN).collect(),
                });
            }
            return Ok(ApiResponse::Text(text));
        }

        let body: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };

        Envelope::from_value(body)
            .into_payload(status)
            .map(ApiResponse::Json)
    }

    fn build_url(&self, path: &str, params: Option<&QueryParams>) -> Result<Url> {
        let base = self.inner.config.base_url.trim_end_matches('/');
        let joined = if path.starts_with('/') || path.is_empty() {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        };
        let mut url = Url::parse(&joined)
            .map_err(|e| ApiError::InvalidRequest(format!("invalid URL {joined}: {e}")))?;
        if let Some(params) = params {
            params.apply_to(&mut url);
        }
        Ok(url)
    }

    fn handle_unauthorized(&self) {
        if let Err(e) = self.inner.auth.clear_auth() {
            warn!(error = %e, "failed to clear auth state after 401");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use axum::body::Bytes;
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{any, get, post};
    use axum::{Json, Router};
    use serde::Deserialize;
    use serde_json::json;

    use aqar_shared::constants::{TOKEN_KEY, USER_KEY};
    use aqar_shared::UserId;
    use aqar_store::StoredUser;

    use super::*;
    use crate::body::{FilePart, FormData};
    use crate::test_support::{serve, test_client, Recorded};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Blog {
        id: u32,
        title: String,
    }

    fn echo_router(recorded: Recorded) -> Router {
        Router::new()
            .route(
                "/echo",
                any(|State(rec): State<Recorded>, headers: HeaderMap, uri: axum::http::Uri, body: Bytes| async move {
                    rec.record(&headers, &uri, &body);
                    Json(json!({ "success": true, "data": { "ok": true } }))
                }),
            )
            .with_state(recorded)
    }

    #[tokio::test]
    async fn json_body_gets_json_content_type() {
        let recorded = Recorded::default();
        let base = serve(echo_router(recorded.clone())).await;
        let client = test_client(&base, None);

        let _: Value = client
            .post("/echo", json!({ "title": "Hello" }), RequestOptions::default())
            .await
            .unwrap();

        let req = recorded.last();
        assert_eq!(req.content_type.as_deref(), Some("application/json"));
        assert_eq!(req.accept.as_deref(), Some("application/json"));
        let sent: Value = serde_json::from_slice(&req.body).unwrap();
        assert_eq!(sent, json!({ "title": "Hello" }));
    }

    #[tokio::test]
    async fn multipart_body_is_sent_as_form() {
        let recorded = Recorded::default();
        let base = serve(echo_router(recorded.clone())).await;
        let client = test_client(&base, None);

        let form = FormData::new()
            .text("message", "hello")
            .file("image", FilePart::new("a.jpg", vec![1u8, 2, 3]).with_mime("image/jpeg"));
        let _: Value = client.post("/echo", form, RequestOptions::default()).await.unwrap();

        let req = recorded.last();
        let content_type = req.content_type.unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
        let body = String::from_utf8_lossy(&req.body);
        assert!(body.contains("name=\"message\""));
        assert!(body.contains("filename=\"a.jpg\""));
    }

    #[tokio::test]
    async fn get_sends_query_and_no_body() {
        let recorded = Recorded::default();
        let base = serve(echo_router(recorded.clone())).await;
        let client = test_client(&base, None);

        let params = QueryParams::new()
            .with("page", 1)
            .with("q", "")
            .with("city", Option::<String>::None)
            .with("type", "شقة");
        let _: Value = client.get("/echo", params, RequestOptions::default()).await.unwrap();

        let req = recorded.last();
        let query = req.query.unwrap();
        assert!(query.contains("page=1"));
        assert!(!query.contains("q="));
        assert!(!query.contains("city"));
        assert!(query.contains("type=%D8%B4%D9%82%D8%A9"));
        assert!(req.body.is_empty());
    }

    #[tokio::test]
    async fn locale_and_bearer_headers() {
        let recorded = Recorded::default();
        let base = serve(echo_router(recorded.clone())).await;
        let client = test_client(&base, Some("secret"));

        let _: Value = client.get("/echo", QueryParams::new(), RequestOptions::default()).await.unwrap();
        let req = recorded.last();
        assert_eq!(req.authorization.as_deref(), Some("Bearer secret"));
        assert_eq!(req.accept_language.as_deref(), Some("ar"));

        client.set_route_path("/en/estates/12");
        let _: Value = client.get("/echo", QueryParams::new(), RequestOptions::default()).await.unwrap();
        assert_eq!(recorded.last().accept_language.as_deref(), Some("en"));

        let _: Value = client
            .get("/echo", QueryParams::new(), RequestOptions::locale(Locale::Ar))
            .await
            .unwrap();
        assert_eq!(recorded.last().accept_language.as_deref(), Some("ar"));
    }

    #[tokio::test]
    async fn unwraps_data_or_returns_whole_body() {
        let app = Router::new()
            .route("/wrapped", get(|| async { Json(json!({ "success": true, "data": { "id": 1, "title": "a" } })) }))
            .route("/bare", get(|| async { Json(json!({ "id": 2, "title": "b" })) }));
        let base = serve(app).await;
        let client = test_client(&base, None);

        let wrapped: Blog = client.get("/wrapped", QueryParams::new(), RequestOptions::default()).await.unwrap();
        assert_eq!(wrapped, Blog { id: 1, title: "a".into() });
        let bare: Blog = client.get("/bare", QueryParams::new(), RequestOptions::default()).await.unwrap();
        assert_eq!(bare, Blog { id: 2, title: "b".into() });
    }

    #[tokio::test]
    async fn unauthorized_clears_state_regardless_of_body() {
        let app = Router::new().route(
            "/profile",
            get(|| async { (StatusCode::UNAUTHORIZED, Json(json!({ "success": true, "data": { "id": 1 } }))) }),
        );
        let base = serve(app).await;
        let client = test_client(&base, Some("stale"));
        client
            .auth()
            .store_user(&StoredUser::new(UserId(7), "Sara"))
            .unwrap();

        let err = client
            .get::<Value>("/profile", QueryParams::new(), RequestOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(client.token().unwrap(), None);
        let db = client.auth().database().lock().unwrap();
        assert_eq!(db.get_item(TOKEN_KEY).unwrap(), None);
        assert_eq!(db.get_item(USER_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn error_statuses_map_to_typed_errors() {
        let app = Router::new()
            .route(
                "/validate",
                post(|| async {
                    (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        Json(json!({ "message": "Invalid", "errors": { "email": ["taken"] } })),
                    )
                }),
            )
            .route(
                "/soft-fail",
                post(|| async { Json(json!({ "success": false, "message": "Already reviewed" })) }),
            )
            .route("/html", get(|| async { (StatusCode::BAD_GATEWAY, "<html>".repeat(100)) }))
            .route("/text", get(|| async { "pong" }));
        let base = serve(app).await;
        let client = test_client(&base, None);

        let err = client
            .post::<Value>("/validate", json!({}), RequestOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.status(), Some(422));
        assert_eq!(err.to_string(), "Invalid");

        let err = client
            .post::<Value>("/soft-fail", json!({}), RequestOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(200));
        assert_eq!(err.to_string(), "Already reviewed");

        match client.get::<Value>("/html", QueryParams::new(), RequestOptions::default()).await {
            Err(ApiError::NonJson { status, snippet }) => {
                assert_eq!(status, 502);
                assert_eq!(snippet.chars().count(), NON_JSON_SNIPPET_LEN);
            }
            other => panic!("expected NonJson, got {other:?}"),
        }

        let text: String = client.get("/text", QueryParams::new(), RequestOptions::default()).await.unwrap();
        assert_eq!(text, "pong");
    }

    #[tokio::test]
    async fn transport_failure_is_not_reclassified() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = test_client(&format!("http://{addr}"), None);
        let err = client
            .get::<Value>("/anything", QueryParams::new(), RequestOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn cancellation_abandons_request() {
        let app = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                Json(json!({}))
            }),
        );
        let base = serve(app).await;
        let client = test_client(&base, None);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = client
            .get::<Value>("/slow", QueryParams::new(), RequestOptions::default().with_cancel(cancel))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Cancelled));
    }

    #[tokio::test]
    async fn path_segments_reach_server() {
        let seen = Arc::new(Mutex::new(None));
        let app = Router::new()
            .route(
                "/items/:id",
                get(|State(seen): State<Arc<Mutex<Option<u32>>>>, Path(id): Path<u32>| async move {
                    *seen.lock().unwrap() = Some(id);
                    (StatusCode::OK, Json(json!({ "data": id }))).into_response()
                }),
            )
            .with_state(seen.clone());
        let base = serve(app).await;
        let client = test_client(&format!("{base}/"), None);

        let id: u32 = client.get("items/5", QueryParams::new(), RequestOptions::default()).await.unwrap();
        assert_eq!(id, 5);
        assert_eq!(*seen.lock().unwrap(), Some(5));
    }
}
