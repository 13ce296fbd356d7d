//! Process-local cache store.
//!
//! Entries live in a `RwLock<HashMap>` with a per-entry expiry. Expired
//! entries read as misses and are removed lazily on the next access. An
//! optional capacity bound drops the entry closest to expiry when a new key
//! would exceed it.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use datarepo_core::{DataRepoResult, RequestContext, StoreError};
use tokio::time::Instant;

use super::traits::CacheStore;

#[derive(Debug, Clone)]
struct Entry {
    payload: Vec<u8>,
    /// `None` never expires.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-memory cache store.
///
/// # Example
///
/// ```ignore
/// let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::with_capacity(10_000));
/// ```
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, Entry>>,
    capacity: Option<usize>,
}

impl MemoryCacheStore {
    /// Create an unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding at most `max_entries` keys.
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::with_capacity(max_entries)),
            capacity: Some(max_entries),
        }
    }

    /// Number of stored entries, expired ones included until touched.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if `key` holds a live entry.
    pub fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .read()
            .map(|e| e.get(key).is_some_and(|entry| !entry.is_expired(now)))
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    fn remove_expired(&self, key: &str) -> DataRepoResult<()> {
        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        let now = Instant::now();
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }
        Ok(())
    }
}

/// Pick the entry to drop when full: expired first, then soonest to expire.
fn eviction_candidate(entries: &HashMap<String, Entry>, now: Instant) -> Option<String> {
    entries
        .iter()
        .min_by_key(|(_, entry)| match entry.expires_at {
            Some(at) if at <= now => (0, Some(at)),
            Some(at) => (1, Some(at)),
            None => (2, None),
        })
        .map(|(key, _)| key.clone())
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, ctx: &RequestContext, key: &str) -> DataRepoResult<Option<Vec<u8>>> {
        ctx.check()?;
        let now = Instant::now();
        let expired = {
            let entries = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.payload.clone())),
                Some(_) => true,
            }
        };
        if expired {
            self.remove_expired(key)?;
        }
        Ok(None)
    }

    async fn set(
        &self,
        ctx: &RequestContext,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> DataRepoResult<()> {
        ctx.check()?;
        let now = Instant::now();
        let expires_at = if ttl.is_zero() { None } else { Some(now + ttl) };

        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        if let Some(capacity) = self.capacity {
            if capacity == 0 {
                return Ok(());
            }
            if !entries.contains_key(key) && entries.len() >= capacity {
                if let Some(victim) = eviction_candidate(&entries, now) {
                    entries.remove(&victim);
                }
            }
        }
        entries.insert(
            key.to_string(),
            Entry {
                payload: value,
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, ctx: &RequestContext, key: &str) -> DataRepoResult<()> {
        ctx.check()?;
        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        entries.remove(key);
        Ok(())
    }
}
