//! Login, registration and session endpoints.

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use aqar_shared::constants::AUTH_BASE_PATH;
use aqar_store::StoredUser;

use crate::body::{FormData, RequestBody};
use crate::client::{ApiClient, RequestOptions};
use crate::error::Result;
use crate::query::QueryParams;

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub password: String,
    pub password_confirmation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Token pair and profile returned by login and register. Older backends
/// send `token`, newer ones `accessToken`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthSession {
    #[serde(default, rename = "accessToken")]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, rename = "refreshToken")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<StoredUser>,
}

impl AuthSession {
    pub fn bearer(&self) -> Option<&str> {
        self.access_token.as_deref().or(self.token.as_deref())
    }
}

#[derive(Clone)]
pub struct AuthService {
    api: ApiClient,
}

impl AuthService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn login(&self, credentials: &LoginRequest) -> Result<AuthSession> {
        let session: AuthSession = self
            .api
            .post(
                &format!("{AUTH_BASE_PATH}/login"),
                RequestBody::json(credentials)?,
                RequestOptions::default(),
            )
            .await?;
        self.persist(&session)?;
        Ok(session)
    }

    /// Registration goes out as a multipart form.
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthSession> {
        let session: AuthSession = self
            .api
            .post(
                "/register",
                FormData::from_serializable(request)?,
                RequestOptions::default(),
            )
            .await?;
        self.persist(&session)?;
        Ok(session)
    }

    /// Local state is cleared even when the server call fails.
    pub async fn logout(&self) -> Result<()> {
        let outcome: Result<IgnoredAny> = self
            .api
            .post("/logout", RequestBody::empty_object(), RequestOptions::default())
            .await;
        if let Err(e) = &outcome {
            warn!(error = %e, "Logout request failed; clearing local session anyway");
        }
        self.api.auth().logout()?;
        info!("Signed out");
        outcome.map(|_| ())
    }

    /// Current profile; also refreshes the cached user.
    pub async fn profile(&self) -> Result<StoredUser> {
        let user: StoredUser = self
            .api
            .get("/profile", QueryParams::new(), RequestOptions::default())
            .await?;
        self.api.auth().store_user(&user)?;
        Ok(user)
    }

    pub async fn update_fcm_token(&self, fcm_token: &str) -> Result<()> {
        let body = serde_json::json!({ "fcm_token": fcm_token });
        let _: IgnoredAny = self
            .api
            .post("/fcm-token", body, RequestOptions::default())
            .await?;
        Ok(())
    }

    fn persist(&self, session: &AuthSession) -> Result<()> {
        let auth = self.api.auth();
        if let Some(token) = session.bearer() {
            auth.persist_login(token, session.user.as_ref())?;
        } else if let Some(user) = &session.user {
            auth.store_user(user)?;
        }
        if let Some(refresh) = &session.refresh_token {
            auth.persist_refresh_token(refresh)?;
        }
        if let Some(user) = &session.user {
            info!(user_id = %user.id, "Signed in");
        }
        Ok(())
    }
}
