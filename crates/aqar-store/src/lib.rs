//! # aqar-store
//!
//! Persisted client state for the Aqar client, backed by SQLite.
//!
//! The crate stands in for the browser's storage: a `local_storage`
//! key/value table, a persisted cookie jar, and on top of them the
//! credential chain that answers "which bearer token do we send?" and the
//! auth lifecycle that clears it again on a 401.

pub mod cookies;
pub mod credentials;
pub mod database;
pub mod local_storage;
pub mod migrations;
pub mod models;
pub mod preferences;

mod error;

pub use cookies::CookieJar;
pub use credentials::{AuthStore, CredentialChain, TokenSource};
pub use database::{Database, SharedDatabase};
pub use error::{Result, StoreError};
pub use models::StoredUser;
