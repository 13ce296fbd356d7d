//! Instrumented cache store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use datarepo_core::{DataRepoResult, RequestContext};

use super::traits::{CacheStats, CacheStore};

/// Counts hits, misses, sets and deletes on a delegate store.
///
/// Only calls the delegate answered successfully are counted. Counting never
/// changes what the delegate returns.
///
/// # Example
///
/// ```ignore
/// let store = Arc::new(StatsCacheStore::new(Arc::new(MemoryCacheStore::new())));
/// // ... run queries through a repository wired with `store` ...
/// println!("hit rate: {:.2}", store.snapshot().hit_rate());
/// ```
pub struct StatsCacheStore {
    delegate: Arc<dyn CacheStore>,
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
}

impl StatsCacheStore {
    pub fn new(delegate: Arc<dyn CacheStore>) -> Self {
        Self {
            delegate,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn sets(&self) -> u64 {
        self.sets.load(Ordering::Relaxed)
    }

    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    /// Reset every counter to zero.
    pub fn clear_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.sets.store(0, Ordering::Relaxed);
        self.deletes.store(0, Ordering::Relaxed);
    }

    /// Current counter values. Counters are read one at a time, so a snapshot
    /// taken under load is not a single consistent cut.
    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits(),
            misses: self.misses(),
            sets: self.sets(),
            deletes: self.deletes(),
        }
    }

    fn record_lookup(&self, found: bool) {
        let counter = if found { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl CacheStore for StatsCacheStore {
    async fn get(&self, ctx: &RequestContext, key: &str) -> DataRepoResult<Option<Vec<u8>>> {
        let found = self.delegate.get(ctx, key).await?;
        self.record_lookup(found.is_some());
        Ok(found)
    }

    async fn get_multi(
        &self,
        ctx: &RequestContext,
        keys: &[String],
    ) -> DataRepoResult<Vec<Option<Vec<u8>>>> {
        let found = self.delegate.get_multi(ctx, keys).await?;
        for payload in &found {
            self.record_lookup(payload.is_some());
        }
        Ok(found)
    }

    async fn set(
        &self,
        ctx: &RequestContext,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> DataRepoResult<()> {
        self.delegate.set(ctx, key, value, ttl).await?;
        self.sets.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn delete(&self, ctx: &RequestContext, key: &str) -> DataRepoResult<()> {
        self.delegate.delete(ctx, key).await?;
        self.deletes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
