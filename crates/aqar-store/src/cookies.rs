//! Cookie jar with expiry, `name=value; …` parsing, and persistence in the
//! `cookies` table.
//!
//! Values are kept percent-encoded exactly as they travel in a `Cookie`
//! header; [`CookieJar::get`] decodes them.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use rusqlite::params;

use crate::database::Database;
use crate::error::Result;

/// Bytes that cannot appear raw in a cookie value.
const COOKIE_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b',')
    .add(b';')
    .add(b'\\')
    .add(b'%');

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    /// Encoded value.
    pub value: String,
    pub path: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Cookie {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: BTreeMap<String, Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `Cookie` header style string (`a=1; b=two`). Pairs without
    /// `=` are ignored; later duplicates win.
    pub fn parse(header: &str) -> Self {
        let mut jar = Self::new();
        for pair in header.split(';') {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            jar.cookies.insert(
                name.to_string(),
                Cookie {
                    value: value.trim().to_string(),
                    path: "/".into(),
                    expires_at: None,
                },
            );
        }
        jar
    }

    /// Serialize live cookies back into header form.
    pub fn to_header(&self) -> String {
        let now = Utc::now();
        self.cookies
            .iter()
            .filter(|(_, c)| !c.is_expired(now))
            .map(|(name, c)| format!("{name}={}", c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Decoded value of a live cookie.
    pub fn get(&self, name: &str) -> Option<String> {
        let cookie = self.cookies.get(name)?;
        if cookie.is_expired(Utc::now()) {
            return None;
        }
        Some(percent_decode_str(&cookie.value).decode_utf8_lossy().into_owned())
    }

    /// Store a cookie; `max_age` of `None` makes it a session cookie.
    pub fn set(&mut self, name: &str, value: &str, max_age: Option<Duration>) {
        self.cookies.insert(
            name.to_string(),
            Cookie {
                value: utf8_percent_encode(value, COOKIE_VALUE).to_string(),
                path: "/".into(),
                expires_at: max_age.map(|age| Utc::now() + age),
            },
        );
    }

    /// Expire a cookie. Returns whether a cookie by that name existed.
    pub fn remove(&mut self, name: &str) -> bool {
        self.cookies.remove(name).is_some()
    }

    pub fn purge_expired(&mut self) {
        let now = Utc::now();
        self.cookies.retain(|_, c| !c.is_expired(now));
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

impl Database {
    pub fn load_cookie_jar(&self) -> Result<CookieJar> {
        let mut stmt = self
            .conn()
            .prepare("SELECT name, value, path, expires_at FROM cookies")?;

        let rows = stmt.query_map([], |row| {
            let name: String = row.get(0)?;
            let value: String = row.get(1)?;
            let path: String = row.get(2)?;
            let expires: Option<String> = row.get(3)?;
            Ok((name, value, path, expires))
        })?;

        let mut jar = CookieJar::new();
        for row in rows {
            let (name, value, path, expires) = row?;
            let expires_at = match expires {
                Some(ts) => Some(DateTime::parse_from_rfc3339(&ts)?.with_timezone(&Utc)),
                None => None,
            };
            jar.cookies.insert(name, Cookie { value, path, expires_at });
        }
        jar.purge_expired();
        Ok(jar)
    }

    /// Replace the persisted jar with `jar`.
    pub fn save_cookie_jar(&self, jar: &CookieJar) -> Result<()> {
        let tx = self.conn().unchecked_transaction()?;
        tx.execute("DELETE FROM cookies", [])?;
        for (name, cookie) in &jar.cookies {
            tx.execute(
                "INSERT INTO cookies (name, value, path, expires_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    name,
                    cookie.value,
                    cookie.path,
                    cookie.expires_at.map(|at| at.to_rfc3339()),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_header_and_decode() {
        let jar = CookieJar::parse("theme=dark; token=a%20b%3Bc; broken; =x");
        assert_eq!(jar.len(), 2);
        assert_eq!(jar.get("token").as_deref(), Some("a b;c"));
        assert_eq!(jar.get("theme").as_deref(), Some("dark"));
        assert_eq!(jar.get("missing"), None);
    }

    #[test]
    fn set_encodes_and_round_trips_through_header() {
        let mut jar = CookieJar::new();
        jar.set("token", "x;y z", None);
        assert_eq!(jar.to_header(), "token=x%3By%20z");
        assert_eq!(CookieJar::parse(&jar.to_header()).get("token").as_deref(), Some("x;y z"));
    }

    #[test]
    fn expired_cookies_are_invisible() {
        let mut jar = CookieJar::new();
        jar.set("token", "old", Some(Duration::seconds(-1)));
        assert_eq!(jar.get("token"), None);
        assert_eq!(jar.to_header(), "");
        jar.purge_expired();
        assert!(jar.is_empty());
    }

    #[test]
    fn remove_reports_presence() {
        let mut jar = CookieJar::new();
        jar.set("token", "t", None);
        assert!(jar.remove("token"));
        assert!(!jar.remove("token"));
    }

    #[test]
    fn persisted_jar_survives_reload() {
        let db = Database::open_in_memory().unwrap();
        let mut jar = CookieJar::new();
        jar.set("token", "abc", Some(Duration::hours(2)));
        jar.set("lang", "en", None);
        db.save_cookie_jar(&jar).unwrap();

        let loaded = db.load_cookie_jar().unwrap();
        assert_eq!(loaded.get("token").as_deref(), Some("abc"));
        assert_eq!(loaded.get("lang").as_deref(), Some("en"));

        jar.remove("lang");
        db.save_cookie_jar(&jar).unwrap();
        assert_eq!(db.load_cookie_jar().unwrap().len(), 1);
    }
}
