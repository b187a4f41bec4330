//! Revocation-layer token cache.
//!
//! Issued tokens are mirrored into a keyed store under
//! `{kind}_token:{subject_id}` so that logout and rotation can invalidate
//! them before their cryptographic expiry. The cache is a soft dependency:
//! signature verification never consults it, and every failure here is
//! reported as a degraded outcome instead of an error so that an
//! unavailable backend cannot take authentication down with it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::{timeout, Instant};
use tracing::warn;

use crate::error::Result;
use crate::token::claims::TokenKind;

/// Result of a best-effort cache operation.
///
/// `Degraded` means the backend was unreachable or timed out; the caller
/// proceeded without it and the reason is carried for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOutcome {
    Ok,
    Degraded(String),
}

impl CacheOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, CacheOutcome::Degraded(_))
    }
}

/// Keyed string store with per-entry TTLs.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn del(&self, key: &str) -> Result<()>;
    async fn exists(&self, key: &str) -> Result<bool>;
}

/// Process-local store with lazy expiry on read.
#[derive(Default)]
pub struct InMemoryTokenStore {
    entries: DashMap<String, (String, Instant)>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.entries
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entries.get(key) {
            Some(entry) if entry.1 > Instant::now() => Ok(Some(entry.0.clone())),
            Some(_) => {
                drop(self.entries.remove(key));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}

/// Redis-backed store using a multiplexed connection manager.
#[cfg(feature = "redis-cache")]
pub struct RedisTokenStore {
    conn: redis::aio::ConnectionManager,
}

#[cfg(feature = "redis-cache")]
impl RedisTokenStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| crate::error::AuthError::CacheUnavailable(e.to_string()))?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| crate::error::AuthError::CacheUnavailable(e.to_string()))?;
        Ok(Self { conn })
    }
}

#[cfg(feature = "redis-cache")]
#[async_trait]
impl TokenStore for RedisTokenStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::AsyncCommands::set_ex(&mut conn, key, value, ttl.as_secs() as usize)
            .await
            .map_err(|e| crate::error::AuthError::CacheUnavailable(e.to_string()))
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        redis::AsyncCommands::get(&mut conn, key)
            .await
            .map_err(|e| crate::error::AuthError::CacheUnavailable(e.to_string()))
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::AsyncCommands::del(&mut conn, key)
            .await
            .map_err(|e| crate::error::AuthError::CacheUnavailable(e.to_string()))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        redis::AsyncCommands::exists(&mut conn, key)
            .await
            .map_err(|e| crate::error::AuthError::CacheUnavailable(e.to_string()))
    }
}

/// Facade over a [`TokenStore`] that applies the key scheme, bounds every
/// call with a timeout, and downgrades failures to [`CacheOutcome::Degraded`].
#[derive(Clone)]
pub struct TokenCache {
    store: Arc<dyn TokenStore>,
    op_timeout: Duration,
}

impl fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCache")
            .field("op_timeout", &self.op_timeout)
            .finish_non_exhaustive()
    }
}

fn cache_key(kind: TokenKind, subject: &str) -> String {
    format!("{}_token:{}", kind.as_str(), subject)
}

impl TokenCache {
    pub fn new(store: Arc<dyn TokenStore>, op_timeout: Duration) -> Self {
        Self { store, op_timeout }
    }

    /// Convenience constructor for the process-local backend.
    pub fn in_memory(op_timeout: Duration) -> Self {
        Self::new(Arc::new(InMemoryTokenStore::new()), op_timeout)
    }

    async fn run<T, F>(&self, op: &str, subject: &str, fut: F) -> std::result::Result<T, String>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        match timeout(self.op_timeout, fut).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => {
                warn!(op, subject, error = %e, "token cache operation failed");
                Err(e.to_string())
            }
            Err(_) => {
                warn!(op, subject, timeout = ?self.op_timeout, "token cache operation timed out");
                Err("operation timed out".to_string())
            }
        }
    }

    /// Records `token` as the current token of `kind` for `subject`,
    /// replacing any previous one.
    pub async fn store(
        &self,
        subject: &str,
        kind: TokenKind,
        token: &str,
        ttl: Duration,
    ) -> CacheOutcome {
        let key = cache_key(kind, subject);
        match self.run("store", subject, self.store.set(&key, token, ttl)).await {
            Ok(()) => CacheOutcome::Ok,
            Err(reason) => CacheOutcome::Degraded(reason),
        }
    }

    /// Returns the current cached token of `kind` for `subject`, if any.
    pub async fn get(&self, subject: &str, kind: TokenKind) -> (Option<String>, CacheOutcome) {
        let key = cache_key(kind, subject);
        match self.run("get", subject, self.store.get(&key)).await {
            Ok(v) => (v, CacheOutcome::Ok),
            Err(reason) => (None, CacheOutcome::Degraded(reason)),
        }
    }

    /// Drops the cached token of `kind` for `subject`. Idempotent.
    pub async fn revoke(&self, subject: &str, kind: TokenKind) -> CacheOutcome {
        let key = cache_key(kind, subject);
        match self.run("revoke", subject, self.store.del(&key)).await {
            Ok(()) => CacheOutcome::Ok,
            Err(reason) => CacheOutcome::Degraded(reason),
        }
    }

    /// Drops both the access and refresh entries for `subject`.
    pub async fn revoke_all(&self, subject: &str) -> CacheOutcome {
        let access = self.revoke(subject, TokenKind::Access).await;
        let refresh = self.revoke(subject, TokenKind::Refresh).await;
        match (access, refresh) {
            (CacheOutcome::Ok, CacheOutcome::Ok) => CacheOutcome::Ok,
            (CacheOutcome::Degraded(r), _) | (_, CacheOutcome::Degraded(r)) => {
                CacheOutcome::Degraded(r)
            }
        }
    }

    /// Whether any token of `kind` is live for `subject`.
    ///
    /// Fails open when the backend is unreachable: signature verification
    /// remains the authoritative check, so a degraded cache must not lock
    /// every holder of a valid token out.
    pub async fn is_valid(&self, subject: &str, kind: TokenKind) -> (bool, CacheOutcome) {
        let key = cache_key(kind, subject);
        match self.run("is_valid", subject, self.store.exists(&key)).await {
            Ok(present) => (present, CacheOutcome::Ok),
            Err(reason) => (true, CacheOutcome::Degraded(reason)),
        }
    }

    /// Whether `token` is the token most recently stored for `subject`.
    /// A rotated-out token verifies cryptographically but is no longer
    /// current here.
    pub async fn is_current(
        &self,
        subject: &str,
        kind: TokenKind,
        token: &str,
    ) -> (bool, CacheOutcome) {
        match self.get(subject, kind).await {
            (Some(cached), outcome) => (cached == token, outcome),
            (None, CacheOutcome::Ok) => (false, CacheOutcome::Ok),
            // Fail open on degradation, mirroring is_valid.
            (None, degraded) => (true, degraded),
        }
    }
}
