//! Cache pool capability and the two typed metadata caches built on it.
//!
//! The TOC cache is URL-addressed and must be revalidated against the TOC's
//! own `nextUpdate`. The statement cache is content-addressed: a key can only
//! ever map to one blob, so concurrent writers racing on it are harmless.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::toc::MetadataToc;
use crate::clock::{Clock, SystemClock};
use crate::error::{AttestaError, Result};

/// When a cache entry stops being served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    At(DateTime<Utc>),
    After(Duration),
}

/// Key to blob store with expiry. `get` returns `Ok(None)` on a miss.
///
/// `set` must be last-write-wins for a given key.
#[async_trait]
pub trait CachePool: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>, expiry: Expiry) -> Result<()>;
}

struct CacheEntry {
    value: Vec<u8>,
    expires_at: DateTime<Utc>,
}

/// Process-local [`CachePool`].
pub struct MemoryCachePool {
    entries: DashMap<String, CacheEntry>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryCachePool {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

impl MemoryCachePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Remove expired entries.
    pub fn cleanup_expired(&self) {
        let now = self.clock.now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for MemoryCachePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCachePool")
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[async_trait]
impl CachePool for MemoryCachePool {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = self.clock.now();
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, expiry: Expiry) -> Result<()> {
        let expires_at = match expiry {
            Expiry::At(at) => at,
            Expiry::After(ttl) => {
                let ttl = chrono::Duration::from_std(ttl)
                    .map_err(|e| AttestaError::Cache(format!("TTL out of range: {e}")))?;
                self.clock
                    .now()
                    .checked_add_signed(ttl)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC)
            }
        };
        self.entries
            .insert(key.to_string(), CacheEntry { value, expires_at });
        Ok(())
    }
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Verified TOCs, keyed by the hash of the URL they were fetched from.
#[derive(Clone)]
pub struct TocCache {
    pool: Arc<dyn CachePool>,
    clock: Arc<dyn Clock>,
}

impl TocCache {
    pub fn new(pool: Arc<dyn CachePool>, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    pub fn key(url: &str) -> String {
        format!("mds.toc.{}", sha256_hex(url.as_bytes()))
    }

    /// A cached TOC that is still before its `nextUpdate`.
    pub async fn get(&self, url: &str) -> Result<Option<MetadataToc>> {
        let Some(raw) = self.pool.get(&Self::key(url)).await? else {
            return Ok(None);
        };
        let toc: MetadataToc = match serde_json::from_slice(&raw) {
            Ok(toc) => toc,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable cached TOC");
                return Ok(None);
            }
        };
        if toc.is_fresh_at(self.clock.now()) {
            Ok(Some(toc))
        } else {
            debug!(no = toc.no, next_update = %toc.next_update, "Cached TOC is stale");
            Ok(None)
        }
    }

    pub async fn put(&self, url: &str, toc: &MetadataToc) -> Result<()> {
        let raw = serde_json::to_vec(toc)
            .map_err(|e| AttestaError::Cache(format!("Failed to serialize TOC: {e}")))?;
        self.pool
            .set(&Self::key(url), raw, Expiry::At(toc.next_update_at()))
            .await
    }
}

impl fmt::Debug for TocCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TocCache").finish_non_exhaustive()
    }
}

/// Raw metadata statement blobs, keyed by their SHA-256.
#[derive(Clone)]
pub struct StatementCache {
    pool: Arc<dyn CachePool>,
    ttl: Duration,
}

impl StatementCache {
    pub fn new(pool: Arc<dyn CachePool>, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    pub fn key(hash: &[u8]) -> String {
        format!("mds.statement.{}", hex::encode(hash))
    }

    pub async fn get(&self, hash: &[u8]) -> Result<Option<Vec<u8>>> {
        self.pool.get(&Self::key(hash)).await
    }

    /// Callers must have checked that `data` hashes to `hash`.
    pub async fn put(&self, hash: &[u8], data: Vec<u8>) -> Result<()> {
        self.pool
            .set(&Self::key(hash), data, Expiry::After(self.ttl))
            .await
    }
}

impl fmt::Debug for StatementCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
