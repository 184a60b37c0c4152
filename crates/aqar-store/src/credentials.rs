//! Bearer-token lookup and auth-state lifecycle.
//!
//! Tokens can live in two places: the `token` cookie and the `token`
//! local-storage key. [`CredentialChain`] consults its sources in order and
//! the first non-empty token wins. [`AuthStore`] builds the canonical chain
//! (cookie, then local storage) and owns the write side: persisting a login
//! and clearing everything on logout or a 401.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Duration;
use tracing::{debug, warn};

use aqar_shared::constants::{
    REFRESH_TOKEN_KEY, REFRESH_TOKEN_MAX_AGE_SECS, TOKEN_KEY, TOKEN_MAX_AGE_SECS, USER_KEY,
};

use crate::cookies::CookieJar;
use crate::database::{self, SharedDatabase};
use crate::error::{Result, StoreError};
use crate::models::StoredUser;

pub type SharedCookieJar = Arc<Mutex<CookieJar>>;

/// One place a bearer token may be stored.
pub trait TokenSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// The stored token, if any. Empty strings count as absent.
    fn token(&self) -> Result<Option<String>>;

    /// Forget the stored token. Must be idempotent.
    fn clear(&self) -> Result<()>;
}

/// Reads the `token` cookie.
pub struct CookieTokenSource {
    jar: SharedCookieJar,
    db: SharedDatabase,
}

impl CookieTokenSource {
    pub fn new(jar: SharedCookieJar, db: SharedDatabase) -> Self {
        Self { jar, db }
    }
}

impl TokenSource for CookieTokenSource {
    fn name(&self) -> &'static str {
        "cookie"
    }

    fn token(&self) -> Result<Option<String>> {
        Ok(lock_jar(&self.jar)?.get(TOKEN_KEY).filter(|t| !t.is_empty()))
    }

    fn clear(&self) -> Result<()> {
        let mut jar = lock_jar(&self.jar)?;
        if jar.remove(TOKEN_KEY) {
            database::lock(&self.db)?.save_cookie_jar(&jar)?;
        }
        Ok(())
    }
}

/// Reads the `token` local-storage key.
pub struct LocalStorageTokenSource {
    db: SharedDatabase,
}

impl LocalStorageTokenSource {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }
}

impl TokenSource for LocalStorageTokenSource {
    fn name(&self) -> &'static str {
        "local_storage"
    }

    fn token(&self) -> Result<Option<String>> {
        Ok(database::lock(&self.db)?
            .get_item(TOKEN_KEY)?
            .filter(|t| !t.is_empty()))
    }

    fn clear(&self) -> Result<()> {
        database::lock(&self.db)?.remove_item(TOKEN_KEY)?;
        Ok(())
    }
}

/// Ordered token sources; earlier sources take precedence.
pub struct CredentialChain {
    sources: Vec<Box<dyn TokenSource>>,
}

impl CredentialChain {
    pub fn new(sources: Vec<Box<dyn TokenSource>>) -> Self {
        Self { sources }
    }

    pub fn token(&self) -> Result<Option<String>> {
        for source in &self.sources {
            if let Some(token) = source.token()? {
                debug!(source = source.name(), "bearer token found");
                return Ok(Some(token));
            }
        }
        Ok(None)
    }

    pub fn clear(&self) -> Result<()> {
        for source in &self.sources {
            source.clear()?;
        }
        Ok(())
    }
}

/// Persisted authentication state: token sources plus the cached profile.
pub struct AuthStore {
    db: SharedDatabase,
    jar: SharedCookieJar,
    chain: CredentialChain,
}

impl AuthStore {
    /// Build the store with the canonical precedence: cookie, then local
    /// storage. The cookie jar is loaded from the database.
    pub fn open(db: SharedDatabase) -> Result<Self> {
        let jar = database::lock(&db)?.load_cookie_jar()?;
        let jar = Arc::new(Mutex::new(jar));
        let chain = CredentialChain::new(vec![
            Box::new(CookieTokenSource::new(jar.clone(), db.clone())),
            Box::new(LocalStorageTokenSource::new(db.clone())),
        ]);
        Ok(Self { db, jar, chain })
    }

    pub fn database(&self) -> &SharedDatabase {
        &self.db
    }

    pub fn token(&self) -> Result<Option<String>> {
        self.chain.token()
    }

    /// Store a fresh login in both the cookie and local storage.
    pub fn persist_login(&self, token: &str, user: Option<&StoredUser>) -> Result<()> {
        {
            let mut jar = lock_jar(&self.jar)?;
            jar.set(TOKEN_KEY, token, Some(Duration::seconds(TOKEN_MAX_AGE_SECS)));
            database::lock(&self.db)?.save_cookie_jar(&jar)?;
        }
        let db = database::lock(&self.db)?;
        db.set_item(TOKEN_KEY, token)?;
        if let Some(user) = user {
            db.set_item(USER_KEY, &serde_json::to_string(user)?)?;
        }
        Ok(())
    }

    pub fn persist_refresh_token(&self, token: &str) -> Result<()> {
        let mut jar = lock_jar(&self.jar)?;
        jar.set(
            REFRESH_TOKEN_KEY,
            token,
            Some(Duration::seconds(REFRESH_TOKEN_MAX_AGE_SECS)),
        );
        database::lock(&self.db)?.save_cookie_jar(&jar)
    }

    pub fn refresh_token(&self) -> Result<Option<String>> {
        Ok(lock_jar(&self.jar)?.get(REFRESH_TOKEN_KEY))
    }

    pub fn store_user(&self, user: &StoredUser) -> Result<()> {
        database::lock(&self.db)?.set_item(USER_KEY, &serde_json::to_string(user)?)
    }

    /// The cached profile. Corrupt JSON is logged and treated as absent.
    pub fn stored_user(&self) -> Result<Option<StoredUser>> {
        let Some(raw) = database::lock(&self.db)?.get_item(USER_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                warn!(error = %e, "failed to parse stored user");
                Ok(None)
            }
        }
    }

    /// Forget the token everywhere plus the cached user. Safe to call
    /// repeatedly and from racing 401 handlers.
    pub fn clear_auth(&self) -> Result<()> {
        self.chain.clear()?;
        database::lock(&self.db)?.remove_item(USER_KEY)?;
        debug!("cleared persisted auth state");
        Ok(())
    }

    /// Logout also drops the refresh token.
    pub fn logout(&self) -> Result<()> {
        self.clear_auth()?;
        let mut jar = lock_jar(&self.jar)?;
        if jar.remove(REFRESH_TOKEN_KEY) {
            database::lock(&self.db)?.save_cookie_jar(&jar)?;
        }
        Ok(())
    }
}

fn lock_jar(jar: &SharedCookieJar) -> Result<MutexGuard<'_, CookieJar>> {
    jar.lock().map_err(|e| StoreError::LockPoisoned(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use aqar_shared::UserId;

    fn shared_db() -> SharedDatabase {
        Database::open_in_memory().unwrap().into_shared()
    }

    #[test]
    fn no_token_anywhere() {
        let store = AuthStore::open(shared_db()).unwrap();
        assert_eq!(store.token().unwrap(), None);
    }

    #[test]
    fn cookie_takes_precedence_over_local_storage() {
        let db = shared_db();
        {
            let guard = db.lock().unwrap();
            guard.set_item(TOKEN_KEY, "from-local").unwrap();
            let mut jar = CookieJar::new();
            jar.set(TOKEN_KEY, "from-cookie", None);
            guard.save_cookie_jar(&jar).unwrap();
        }
        let store = AuthStore::open(db).unwrap();
        assert_eq!(store.token().unwrap().as_deref(), Some("from-cookie"));
    }

    #[test]
    fn falls_back_to_local_storage() {
        let db = shared_db();
        db.lock().unwrap().set_item(TOKEN_KEY, "from-local").unwrap();
        let store = AuthStore::open(db).unwrap();
        assert_eq!(store.token().unwrap().as_deref(), Some("from-local"));
    }

    #[test]
    fn empty_token_counts_as_absent() {
        let db = shared_db();
        db.lock().unwrap().set_item(TOKEN_KEY, "").unwrap();
        let store = AuthStore::open(db).unwrap();
        assert_eq!(store.token().unwrap(), None);
    }

    #[test]
    fn persist_then_clear_is_idempotent() {
        let store = AuthStore::open(shared_db()).unwrap();
        let user = StoredUser::new(UserId(7), "Sara");
        store.persist_login("tok", Some(&user)).unwrap();
        assert_eq!(store.token().unwrap().as_deref(), Some("tok"));
        assert_eq!(store.stored_user().unwrap().unwrap().id, UserId(7));

        store.clear_auth().unwrap();
        store.clear_auth().unwrap();
        assert_eq!(store.token().unwrap(), None);
        assert_eq!(store.stored_user().unwrap(), None);
        let db = store.database().lock().unwrap();
        assert_eq!(db.get_item(TOKEN_KEY).unwrap(), None);
        assert_eq!(db.load_cookie_jar().unwrap().get(TOKEN_KEY), None);
    }

    #[test]
    fn corrupt_user_is_ignored() {
        let db = shared_db();
        db.lock().unwrap().set_item(USER_KEY, "{not json").unwrap();
        let store = AuthStore::open(db).unwrap();
        assert_eq!(store.stored_user().unwrap(), None);
    }

    #[test]
    fn logout_drops_refresh_token() {
        let store = AuthStore::open(shared_db()).unwrap();
        store.persist_refresh_token("refresh").unwrap();
        store.persist_login("tok", None).unwrap();
        assert_eq!(store.refresh_token().unwrap().as_deref(), Some("refresh"));

        store.clear_auth().unwrap();
        assert_eq!(store.refresh_token().unwrap().as_deref(), Some("refresh"));

        store.logout().unwrap();
        assert_eq!(store.refresh_token().unwrap(), None);
    }
}
