//! Cache handlers.
//!
//! A handler knows how one logical index maps records to cache keys and how
//! reads and writes against that index behave. There are exactly two kinds:
//!
//! - [`UniqueKeyHandler`]: one entry per key, holding one record
//! - [`NonUniqueKeyHandler`]: one entry per key, holding the group of records
//!   sharing that key, told apart by a sub-key
//!
//! Both share key derivation through [`KeySpace`] and the read-through
//! algorithm in this module; they differ only in `set`.

mod non_unique;
mod unique;

pub use non_unique::NonUniqueKeyHandler;
pub use unique::UniqueKeyHandler;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use datarepo_core::{
    DataRepoResult, FetchError, KeyExtractor, KeyValue, Lookup, Record, RequestContext,
    StoreError,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::codec;
use crate::source::DataFetcher;
use crate::store::CacheStore;

/// Key derivation shared by both handler kinds.
#[derive(Debug, Clone)]
pub struct KeySpace<T> {
    prefix: String,
    key: KeyExtractor<T>,
    expiration: Duration,
}

impl<T> KeySpace<T> {
    pub fn new(prefix: impl Into<String>, key: KeyExtractor<T>, expiration: Duration) -> Self {
        Self {
            prefix: prefix.into(),
            key,
            expiration,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Label of the index field, as passed to the data fetcher.
    pub fn field(&self) -> &str {
        self.key.field()
    }

    pub fn expiration(&self) -> Duration {
        self.expiration
    }

    /// The index key of `value`.
    pub fn key_of(&self, value: &T) -> KeyValue {
        self.key.extract(value)
    }

    /// `prefix + id`.
    pub fn cache_key(&self, id: &KeyValue) -> String {
        format!("{}{}", self.prefix, id)
    }

    pub fn cache_key_for(&self, value: &T) -> String {
        self.cache_key(&self.key_of(value))
    }

    /// Best-effort write of a fetched value. A failure is logged and dropped:
    /// the caller already has the value from the source of truth.
    async fn write_back<V>(
        &self,
        ctx: &RequestContext,
        store: &dyn CacheStore,
        cache_key: &str,
        value: &V,
    ) where
        V: Serialize + Sync,
    {
        let written = match codec::encode(cache_key, value) {
            Ok(payload) => store.set(ctx, cache_key, payload, self.expiration).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            warn!(key = cache_key, error = %e, "failed to write fetched value back to cache");
        }
    }
}

/// Behaviour of one index.
///
/// `Value` is what one key resolves to: `T` for a unique index, `Vec<T>` for
/// a non-unique one. `get` and `get_multi` are the same for both kinds.
#[async_trait]
pub trait CacheHandler<T: Record>: Send + Sync {
    type Value: Record;

    fn key_space(&self) -> &KeySpace<T>;

    /// Read `id` from `store`, falling back to `fetcher` on a miss.
    async fn get(
        &self,
        ctx: &RequestContext,
        store: &dyn CacheStore,
        id: &KeyValue,
        fetcher: &dyn DataFetcher<Self::Value>,
    ) -> DataRepoResult<Lookup<Self::Value>> {
        read_through(ctx, self.key_space(), store, id, fetcher).await
    }

    /// Batched `get`. The result is positionally aligned with `ids`.
    async fn get_multi(
        &self,
        ctx: &RequestContext,
        store: &dyn CacheStore,
        ids: &[KeyValue],
        fetcher: &dyn DataFetcher<Self::Value>,
    ) -> DataRepoResult<Vec<Lookup<Self::Value>>> {
        read_through_multi(ctx, self.key_space(), store, ids, fetcher).await
    }

    /// Refresh the cache entry derived from `value`.
    async fn set(&self, ctx: &RequestContext, store: &dyn CacheStore, value: &T)
        -> DataRepoResult<()>;

    /// Evict the cache entry derived from `value`.
    async fn delete_value(
        &self,
        ctx: &RequestContext,
        store: &dyn CacheStore,
        value: &T,
    ) -> DataRepoResult<()> {
        let id = self.key_space().key_of(value);
        self.delete(ctx, store, &id).await
    }

    /// Evict the cache entry for `id`.
    async fn delete(
        &self,
        ctx: &RequestContext,
        store: &dyn CacheStore,
        id: &KeyValue,
    ) -> DataRepoResult<()> {
        store.delete(ctx, &self.key_space().cache_key(id)).await
    }
}

/// Single-key read-through.
///
/// A store error is returned without consulting the fetcher, so a failing
/// cache never looks like a miss. Only non-empty fetch results are written
/// back.
async fn read_through<T, V>(
    ctx: &RequestContext,
    space: &KeySpace<T>,
    store: &dyn CacheStore,
    id: &KeyValue,
    fetcher: &dyn DataFetcher<V>,
) -> DataRepoResult<Lookup<V>>
where
    V: Record,
{
    let cache_key = space.cache_key(id);
    if let Some(payload) = store.get(ctx, &cache_key).await? {
        return Ok(Lookup::Value(codec::decode(&cache_key, &payload)?));
    }

    debug!(prefix = %space.prefix, key = %id, "cache miss");
    let found = fetcher.find_by_key(ctx, space.field(), id).await?;
    if let Lookup::Value(value) = &found {
        space.write_back(ctx, store, &cache_key, value).await;
    }
    Ok(found)
}

/// Batched read-through.
///
/// One `get_multi` on the store, then one `find_by_keys` on the fetcher for
/// the distinct missed ids. Repeated ids are fetched and written back once
/// and fan back out to every position they occupied.
async fn read_through_multi<T, V>(
    ctx: &RequestContext,
    space: &KeySpace<T>,
    store: &dyn CacheStore,
    ids: &[KeyValue],
    fetcher: &dyn DataFetcher<V>,
) -> DataRepoResult<Vec<Lookup<V>>>
where
    V: Record,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let cache_keys: Vec<String> = ids.iter().map(|id| space.cache_key(id)).collect();
    let payloads = store.get_multi(ctx, &cache_keys).await?;
    if payloads.len() != ids.len() {
        return Err(StoreError::Backend {
            store: "get_multi".to_string(),
            reason: format!("{} payloads for {} keys", payloads.len(), ids.len()),
        }
        .into());
    }

    let mut results: Vec<Lookup<V>> = Vec::with_capacity(ids.len());
    // distinct missed ids, first occurrence order
    let mut missed: Vec<KeyValue> = Vec::new();
    let mut slot_of: HashMap<&KeyValue, usize> = HashMap::new();
    // (input position, index into `missed`)
    let mut pending: Vec<(usize, usize)> = Vec::new();

    for (position, (id, payload)) in ids.iter().zip(payloads).enumerate() {
        match payload {
            Some(bytes) => {
                results.push(Lookup::Value(codec::decode(&cache_keys[position], &bytes)?));
            }
            None => {
                let slot = *slot_of.entry(id).or_insert_with(|| {
                    missed.push(id.clone());
                    missed.len() - 1
                });
                pending.push((position, slot));
                results.push(Lookup::Empty);
            }
        }
    }

    debug!(
        prefix = %space.prefix,
        hits = ids.len() - pending.len(),
        misses = missed.len(),
        "batched cache read"
    );
    if missed.is_empty() {
        return Ok(results);
    }

    let fetched = fetcher.find_by_keys(ctx, space.field(), &missed).await?;
    if fetched.len() != missed.len() {
        return Err(FetchError::LengthMismatch {
            expected: missed.len(),
            got: fetched.len(),
        }
        .into());
    }

    for (id, found) in missed.iter().zip(&fetched) {
        if let Lookup::Value(value) = found {
            space.write_back(ctx, store, &space.cache_key(id), value).await;
        }
    }
    for (position, slot) in pending {
        results[position] = fetched[slot].clone();
    }
    Ok(results)
}
