use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SharedError {
    #[error("Unsupported locale: {0}")]
    UnsupportedLocale(String),
}
