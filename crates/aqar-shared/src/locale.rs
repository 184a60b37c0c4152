//! Supported UI locales and route-path locale detection.

use serde::{Deserialize, Serialize};

use crate::error::SharedError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Ar,
    En,
}

impl Locale {
    pub const ALL: [Locale; 2] = [Locale::Ar, Locale::En];

    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::Ar => "ar",
            Locale::En => "en",
        }
    }

    pub fn is_rtl(&self) -> bool {
        matches!(self, Locale::Ar)
    }

    /// Locale named by the first non-empty segment of a route path
    /// (`/en/estates/3` → `en`), if it is a supported one.
    pub fn from_route_path(path: &str) -> Option<Self> {
        path.split('/')
            .find(|segment| !segment.is_empty())
            .and_then(|segment| segment.parse().ok())
    }
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Locale {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ar" => Ok(Locale::Ar),
            "en" => Ok(Locale::En),
            other => Err(SharedError::UnsupportedLocale(other.to_string())),
        }
    }
}
