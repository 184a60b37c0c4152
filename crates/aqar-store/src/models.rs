//! Records persisted as JSON in local storage.

use serde::{Deserialize, Serialize};

use aqar_shared::UserId;

/// The signed-in user's profile as cached under the `user` key.
///
/// Only the id is load-bearing for the client core; every other profile
/// field is carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredUser {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl StoredUser {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Some(name.into()),
            extra: serde_json::Map::new(),
        }
    }
}
