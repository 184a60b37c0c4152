//! In-process backend for client tests.

use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::http::{HeaderMap, Uri};
use axum::Router;

use aqar_store::{AuthStore, Database};

use crate::client::ApiClient;
use crate::config::ApiConfig;

/// Bind `app` on an ephemeral local port and return its base URL.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Client against `base` with a fresh in-memory store, optionally logged in.
pub fn test_client(base: &str, token: Option<&str>) -> ApiClient {
    let db = Database::open_in_memory().unwrap().into_shared();
    let auth = Arc::new(AuthStore::open(db).unwrap());
    if let Some(token) = token {
        auth.persist_login(token, None).unwrap();
    }
    ApiClient::new(ApiConfig::new(base), auth).unwrap()
}

#[derive(Debug, Clone, Default)]
pub struct RecordedRequest {
    pub path: String,
    pub query: Option<String>,
    pub content_type: Option<String>,
    pub accept: Option<String>,
    pub accept_language: Option<String>,
    pub authorization: Option<String>,
    pub body: Vec<u8>,
}

/// Requests seen by a test route, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct Recorded(Arc<Mutex<Vec<RecordedRequest>>>);

impl Recorded {
    pub fn record(&self, headers: &HeaderMap, uri: &Uri, body: &Bytes) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        self.0.lock().unwrap().push(RecordedRequest {
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            content_type: header("content-type"),
            accept: header("accept"),
            accept_language: header("accept-language"),
            authorization: header("authorization"),
            body: body.to_vec(),
        });
    }

    pub fn last(&self) -> RecordedRequest {
        self.0.lock().unwrap().last().cloned().expect("no request recorded")
    }

    pub fn all(&self) -> Vec<RecordedRequest> {
        self.0.lock().unwrap().clone()
    }
}
