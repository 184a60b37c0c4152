//! v001 -- Initial schema creation.
//!
//! Creates the two client-state tables: `local_storage` and `cookies`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Local storage (string key/value, like the browser's)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS local_storage (
    key        TEXT PRIMARY KEY NOT NULL,
    value      TEXT NOT NULL,
    updated_at TEXT NOT NULL                 -- RFC-3339
);

-- ----------------------------------------------------------------
-- Cookies (persisted jar)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS cookies (
    name       TEXT PRIMARY KEY NOT NULL,
    value      TEXT NOT NULL,                -- percent-encoded, as on the wire
    path       TEXT NOT NULL DEFAULT '/',
    expires_at TEXT                          -- RFC-3339, NULL = session cookie
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
