//! Token → document store with fixed-window expiry
//!
//! # Thread Safety
//!
//! The map is split into shards, each behind a `parking_lot::RwLock`.
//! A token always lives in the shard picked by its own random bits, so
//! requests for unrelated documents rarely touch the same lock, and no lock
//! is ever held across an `.await`.
//!
//! Entries are handed out as `Arc<CachedDocument>`: a request that already
//! holds an entry keeps reading the same bytes even if the entry is removed
//! concurrently.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::time::Instant;

use super::SessionToken;

/// Lifetime of a loaded document unless configured otherwise
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

/// Number of lock partitions
pub const DEFAULT_SHARDS: usize = 16;

type Shard = RwLock<HashMap<SessionToken, Arc<CachedDocument>>>;

/// A loaded document, immutable once stored
#[derive(Debug)]
pub struct CachedDocument {
    token: SessionToken,
    bytes: Arc<Vec<u8>>,
    created_at: Instant,
    ttl: Duration,
    loaded_at: DateTime<Utc>,
}

impl CachedDocument {
    pub fn token(&self) -> SessionToken {
        self.token
    }

    /// The canonical document bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle to the bytes, for moving into blocking tasks
    pub fn shared_bytes(&self) -> Arc<Vec<u8>> {
        Arc::clone(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Wall-clock time of the Load that created this entry
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Wall-clock estimate of when the entry stops resolving
    pub fn expires_at(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| self.loaded_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Expired at or after `created_at + ttl`
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.created_at.checked_add(self.ttl) {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }
}

/// Concurrent, time-expiring document store
#[derive(Clone)]
pub struct SessionCache {
    inner: Arc<SessionCacheInner>,
}

struct SessionCacheInner {
    shards: Vec<Shard>,
    ttl: Duration,
}

impl SessionCache {
    /// Create a cache whose entries live for `ttl` after creation
    pub fn new(ttl: Duration) -> Self {
        Self::with_shards(ttl, DEFAULT_SHARDS)
    }

    pub fn with_shards(ttl: Duration, shards: usize) -> Self {
        let shards = (0..shards.max(1))
            .map(|_| RwLock::new(HashMap::new()))
            .collect();

        Self {
            inner: Arc::new(SessionCacheInner { shards, ttl }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    fn shard(&self, token: &SessionToken) -> &Shard {
        &self.inner.shards[token.shard(self.inner.shards.len())]
    }

    // ========================================================================
    // Entry Lifecycle
    // ========================================================================

    /// Store `bytes` under a freshly minted token
    pub fn put(&self, bytes: Vec<u8>) -> Arc<CachedDocument> {
        let bytes = Arc::new(bytes);

        loop {
            let token = SessionToken::generate();
            let mut shard = self.shard(&token).write();

            // A live token is never handed out twice
            let Entry::Vacant(slot) = shard.entry(token) else {
                continue;
            };

            let document = Arc::new(CachedDocument {
                token,
                bytes: Arc::clone(&bytes),
                created_at: Instant::now(),
                ttl: self.inner.ttl,
                loaded_at: Utc::now(),
            });
            slot.insert(Arc::clone(&document));
            drop(shard);

            tracing::debug!(
                token = %token,
                bytes = document.len(),
                ttl_secs = self.inner.ttl.as_secs(),
                "Cached document"
            );

            return document;
        }
    }

    /// Look up a caller-supplied token.
    ///
    /// Malformed, unknown, unloaded and expired tokens all miss. Lookups never
    /// extend an entry's lifetime.
    pub fn get(&self, raw: &str) -> Option<Arc<CachedDocument>> {
        let token = SessionToken::parse(raw)?;
        self.get_token(&token)
    }

    pub fn get_token(&self, token: &SessionToken) -> Option<Arc<CachedDocument>> {
        let now = Instant::now();
        let shard = self.shard(token).read();
        shard
            .get(token)
            .filter(|document| !document.is_expired_at(now))
            .cloned()
    }

    /// Remove an entry. Removing an absent token is not an error.
    pub fn remove(&self, raw: &str) -> Option<Arc<CachedDocument>> {
        let token = SessionToken::parse(raw)?;
        self.remove_token(&token)
    }

    pub fn remove_token(&self, token: &SessionToken) -> Option<Arc<CachedDocument>> {
        let removed = self.shard(token).write().remove(token);

        if let Some(document) = &removed {
            tracing::debug!(token = %token, bytes = document.len(), "Removed cached document");
        }

        removed
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    /// Purge expired entries and return their tokens.
    ///
    /// Candidates are collected under a read lock; each removal re-checks
    /// the entry under the write lock and releases it straight away.
    pub fn sweep(&self) -> Vec<SessionToken> {
        let now = Instant::now();
        let mut purged = Vec::new();

        for shard in &self.inner.shards {
            let expired: Vec<SessionToken> = shard
                .read()
                .iter()
                .filter(|(_, document)| document.is_expired_at(now))
                .map(|(token, _)| *token)
                .collect();

            for token in expired {
                let mut guard = shard.write();
                if guard
                    .get(&token)
                    .is_some_and(|document| document.is_expired_at(now))
                {
                    guard.remove(&token);
                    purged.push(token);
                }
            }
        }

        if !purged.is_empty() {
            tracing::info!(count = purged.len(), "Purged expired document sessions");
        }

        purged
    }

    /// Number of stored entries, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.inner.shards.iter().map(|shard| shard.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.shards.iter().all(|shard| shard.read().is_empty())
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

// ============================================================================
// Tests
// ============================================================================
