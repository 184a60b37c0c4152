//! HTTP client for the Aqar backend.
//!
//! [`ApiClient`] attaches locale and credentials to every request, unwraps
//! the backend's `{ success, data, message }` envelope, and maps failures
//! to [`ApiError`]. Endpoint groups live in [`services`].

pub mod body;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod headers;
pub mod query;
pub mod services;

#[cfg(test)]
mod test_support;

pub use body::{FilePart, FormData, RequestBody};
pub use client::{ApiClient, ApiResponse, RequestOptions};
pub use config::ApiConfig;
pub use error::{ApiError, Result};
pub use query::QueryParams;
