//! Query cache with retry and error presentation.
//!
//! One [`QueryClient`] is built per execution context and passed to whoever
//! needs it. Values are cached per [`QueryKey`] until they go stale or a
//! key prefix is invalidated.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use aqar_api::{ApiError, Result as ApiResult};
use aqar_shared::constants::{GENERIC_ERROR_MESSAGE, UNAUTHENTICATED_MESSAGE};
use aqar_shared::ChatId;

use crate::events::Notice;

pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(60);

/// Entries older than this are dropped on the next write.
pub const DEFAULT_CACHE_TIME: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
    Text(String),
    Number(i64),
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        KeyPart::Text(value.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        KeyPart::Text(value)
    }
}

impl From<i64> for KeyPart {
    fn from(value: i64) -> Self {
        KeyPart::Number(value)
    }
}

impl From<u32> for KeyPart {
    fn from(value: u32) -> Self {
        KeyPart::Number(i64::from(value))
    }
}

impl From<ChatId> for KeyPart {
    fn from(value: ChatId) -> Self {
        KeyPart::Number(value.0 as i64)
    }
}

/// Ordered list of scalars identifying a cached query, e.g.
/// `["messages", 42, 1]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
    pub fn new(root: impl Into<KeyPart>) -> Self {
        Self(vec![root.into()])
    }

    pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
        self.0.push(part.into());
        self
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn chats() -> Self {
        Self::new("chats")
    }

    pub fn messages(chat_id: ChatId) -> Self {
        Self::new("messages").with(chat_id)
    }

    pub fn unread_count() -> Self {
        Self::new("unread-count")
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match part {
                KeyPart::Text(text) => write!(f, "{text:?}")?,
                KeyPart::Number(n) => write!(f, "{n}")?,
            }
        }
        f.write_str("]")
    }
}

/// When a failed query is tried again.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries allowed after the first failure.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Same limits without waiting between attempts.
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Auth failures are final; everything else gets `max_retries` more tries.
    pub fn should_retry(&self, failure_count: u32, error: &ApiError) -> bool {
        if error.is_unauthorized() || error.is_forbidden() {
            return false;
        }
        failure_count < self.max_retries
    }

    pub fn delay(&self, failure_count: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(failure_count))
            .min(self.max_delay)
    }
}

/// Turns failed queries and mutations into user-facing notices.
#[derive(Debug, Clone, Default)]
pub struct ErrorPresenter {
    tx: Option<mpsc::UnboundedSender<Notice>>,
}

impl ErrorPresenter {
    pub fn new(tx: mpsc::UnboundedSender<Notice>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A presenter that decides but never publishes.
    pub fn silent() -> Self {
        Self::default()
    }

    /// The notice a failure deserves, if any. Unauthorized errors are left
    /// to the login redirect.
    pub fn notice_for(error: &ApiError, skip_global_error: bool) -> Option<Notice> {
        if skip_global_error || error.is_unauthorized() {
            return None;
        }
        let message = error.to_string();
        let message = if message.trim().is_empty() {
            GENERIC_ERROR_MESSAGE.to_string()
        } else {
            message
        };
        if message == UNAUTHENTICATED_MESSAGE {
            return None;
        }
        Some(Notice::error(message))
    }

    /// Publish the notice for `error`. Returns whether one was shown.
    pub fn present(&self, error: &ApiError, skip_global_error: bool) -> bool {
        let Some(notice) = Self::notice_for(error, skip_global_error) else {
            return false;
        };
        match &self.tx {
            Some(tx) => tx.send(notice).is_ok(),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOptions {
    /// Overrides the client's default freshness window.
    pub stale_time: Option<Duration>,
    pub skip_global_error: bool,
}

impl QueryOptions {
    pub fn stale_after(stale_time: Duration) -> Self {
        Self {
            stale_time: Some(stale_time),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MutationOptions {
    pub skip_global_error: bool,
}

impl MutationOptions {
    pub fn quiet() -> Self {
        Self {
            skip_global_error: true,
        }
    }
}

struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    fetched_at: Instant,
    invalidated: bool,
}

pub struct QueryClient {
    entries: Mutex<HashMap<QueryKey, Entry>>,
    default_stale_time: Duration,
    cache_time: Duration,
    retry: RetryPolicy,
    presenter: ErrorPresenter,
}

impl QueryClient {
    pub fn new(presenter: ErrorPresenter) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_stale_time: DEFAULT_STALE_TIME,
            cache_time: DEFAULT_CACHE_TIME,
            retry: RetryPolicy::default(),
            presenter,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_default_stale_time(mut self, stale_time: Duration) -> Self {
        self.default_stale_time = stale_time;
        self
    }

    pub fn with_cache_time(mut self, cache_time: Duration) -> Self {
        self.cache_time = cache_time;
        self
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Return the cached value while fresh, otherwise run `fetcher` under
    /// the retry policy and cache its result.
    pub async fn fetch_query<T, F, Fut>(&self, key: QueryKey, options: QueryOptions, fetcher: F) -> ApiResult<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let stale_time = options.stale_time.unwrap_or(self.default_stale_time);
        if let Some(value) = self.fresh::<T>(&key, stale_time) {
            debug!(key = %key, "Query cache hit");
            return Ok(value);
        }

        let mut failure_count = 0;
        loop {
            match fetcher().await {
                Ok(value) => {
                    self.set_query_data(key, value.clone());
                    return Ok(value);
                }
                Err(e) if self.retry.should_retry(failure_count, &e) => {
                    let delay = self.retry.delay(failure_count);
                    failure_count += 1;
                    debug!(key = %key, attempt = failure_count, error = %e, "Retrying query");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Query failed");
                    self.presenter.present(&e, options.skip_global_error);
                    return Err(e);
                }
            }
        }
    }

    /// Run a mutation once. Failures are presented, never retried.
    pub async fn mutate<T, Fut>(&self, options: MutationOptions, mutation: Fut) -> ApiResult<T>
    where
        Fut: Future<Output = ApiResult<T>>,
    {
        let outcome = mutation.await;
        if let Err(e) = &outcome {
            warn!(error = %e, "Mutation failed");
            self.presenter.present(e, options.skip_global_error);
        }
        outcome
    }

    fn fresh<T: Clone + 'static>(&self, key: &QueryKey, stale_time: Duration) -> Option<T> {
        let entries = self.entries();
        let entry = entries.get(key)?;
        if entry.invalidated || entry.fetched_at.elapsed() >= stale_time {
            return None;
        }
        entry.value.downcast_ref::<T>().cloned()
    }

    /// Cached value regardless of freshness.
    pub fn get_query_data<T: Clone + 'static>(&self, key: &QueryKey) -> Option<T> {
        self.entries().get(key)?.value.downcast_ref::<T>().cloned()
    }

    pub fn set_query_data<T: Send + Sync + 'static>(&self, key: QueryKey, value: T) {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| entry.fetched_at.elapsed() < self.cache_time);
        if entries.len() < before {
            debug!(dropped = before - entries.len(), "Pruned expired queries");
        }
        entries.insert(
            key,
            Entry {
                value: Arc::new(value),
                fetched_at: Instant::now(),
                invalidated: false,
            },
        );
    }

    /// Mark every key under `prefix` stale. Returns how many were hit.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut count = 0;
        for (key, entry) in self.entries().iter_mut() {
            if key.starts_with(prefix) {
                entry.invalidated = true;
                count += 1;
            }
        }
        debug!(prefix = %prefix, count, "Invalidated queries");
        count
    }

    /// Forget every key under `prefix`. Returns how many were dropped.
    pub fn remove_queries(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }

    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.entries().get(key).map_or(true, |entry| entry.invalidated)
    }

    pub fn clear(&self) {
        self.entries().clear();
    }
}
