//! Cache store trait and usage statistics.
//!
//! This module defines the trait that every cache backend implements. The
//! engine only ever talks to stores through it.

use std::time::Duration;

use async_trait::async_trait;
use datarepo_core::{DataRepoResult, RequestContext};

/// Cache store trait for pluggable cache backends.
///
/// This trait abstracts over different backends (in-process memory,
/// Redis, a chain of both). Implementations must be thread-safe and support
/// concurrent access; the engine adds no locking of its own.
///
/// # Keys and values
///
/// Keys are opaque strings built by the engine as `prefix + key`. Values are
/// opaque encoded payloads (see [`crate::codec`]); a store never needs to
/// know the record type.
///
/// # Not found vs. failure
///
/// `get` and `get_multi` return `Ok(None)` for a miss. An `Err` is a backend
/// failure and is returned to the caller as-is: the engine does not fall back
/// to the data fetcher when a store errors.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get the payload stored under `key`.
    async fn get(&self, ctx: &RequestContext, key: &str) -> DataRepoResult<Option<Vec<u8>>>;

    /// Get payloads for several keys, positionally aligned with `keys`.
    ///
    /// The default implementation issues one `get` per key. Backends with a
    /// native batch read should override it.
    async fn get_multi(
        &self,
        ctx: &RequestContext,
        keys: &[String],
    ) -> DataRepoResult<Vec<Option<Vec<u8>>>> {
        let mut found = Vec::with_capacity(keys.len());
        for key in keys {
            found.push(self.get(ctx, key).await?);
        }
        Ok(found)
    }

    /// Store `value` under `key` for `ttl`. A zero `ttl` means no expiry.
    async fn set(
        &self,
        ctx: &RequestContext,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> DataRepoResult<()>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn delete(&self, ctx: &RequestContext, key: &str) -> DataRepoResult<()>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of successful writes.
    pub sets: u64,
    /// Number of successful deletes.
    pub deletes: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
