//! Access-token caching over a pluggable key/value store with TTL.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;

use crate::http_client::BoxFuture;
use crate::{VendorError, VendorErrorKind, VendorId};

/// Key/value store with per-entry TTL.
///
/// Implementations must tolerate concurrent readers and writers; the token
/// cache never relies on mutual exclusion for population.
pub trait CacheBackend: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<String>>;

    fn set<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> BoxFuture<'a, ()>;

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, ()>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// Thread-safe in-process cache backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    inner: Arc<tokio::sync::RwLock<HashMap<String, CacheEntry>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove expired entries.
    pub async fn clear_expired(&self) {
        let now = Instant::now();
        self.inner
            .write()
            .await
            .retain(|_, entry| entry.expires_at > now);
    }

    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

impl CacheBackend for MemoryCache {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<String>> {
        Box::pin(async move {
            let store = self.inner.read().await;
            store
                .get(key)
                .filter(|entry| Instant::now() < entry.expires_at)
                .map(|entry| entry.value.clone())
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let expires_at = Instant::now() + ttl;
            self.inner
                .write()
                .await
                .insert(key.to_owned(), CacheEntry { value, expires_at });
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.inner.write().await.remove(key);
        })
    }
}

/// Token value as persisted in the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedToken {
    pub value: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl CachedToken {
    pub fn new(value: impl Into<String>, ttl: Duration) -> Self {
        Self {
            value: value.into(),
            expires_at: OffsetDateTime::now_utc() + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() >= self.expires_at
    }
}

/// Get-or-fetch manager for vendor access tokens.
#[derive(Clone)]
pub struct TokenCache {
    backend: Arc<dyn CacheBackend>,
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache").finish_non_exhaustive()
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl TokenCache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCache::new()))
    }

    /// Deterministic key for a vendor credential.
    pub fn key(vendor: VendorId, fragment: &str) -> String {
        format!("{vendor}:token:{fragment}")
    }

    /// Returns the cached token, or runs `fetch` once and stores its result for `ttl`.
    ///
    /// `refresh` skips the lookup. Any failure of `fetch`, and an empty token,
    /// surface as `TokenAcquisition` errors.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        refresh: bool,
        fetch: F,
    ) -> Result<String, VendorError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, VendorError>>,
    {
        if !refresh {
            if let Some(token) = self.lookup(key).await {
                debug!(key, "token cache hit");
                return Ok(token);
            }
        }

        debug!(key, refresh, "token cache miss; fetching");
        let token = fetch().await.map_err(|error| match error.kind() {
            VendorErrorKind::TokenAcquisition => error,
            _ => VendorError::token_acquisition(format!("login failed: {}", error.message())),
        })?;

        if token.trim().is_empty() {
            return Err(VendorError::token_acquisition(
                "login response did not contain a token",
            ));
        }

        let entry = CachedToken::new(token.clone(), ttl);
        match serde_json::to_string(&entry) {
            Ok(serialized) => self.backend.set(key, serialized, ttl).await,
            Err(error) => debug!(key, %error, "token not cached"),
        }

        Ok(token)
    }

    /// Drops the cached token so the next access logs in again.
    pub async fn invalidate(&self, key: &str) {
        self.backend.remove(key).await;
    }

    async fn lookup(&self, key: &str) -> Option<String> {
        let raw = self.backend.get(key).await?;
        let entry: CachedToken = serde_json::from_str(&raw).ok()?;
        if entry.is_expired() {
            return None;
        }
        Some(entry.value)
    }
}
