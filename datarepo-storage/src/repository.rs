//! Repositories.
//!
//! A [`ReadOnlyCachedRepository`] dispatches reads by field name to the cache
//! registered for that field. A [`CachedRepository`] adds writes: each one goes
//! to the data writer first and, only once it succeeded, is propagated to every
//! registered cache according to the [`WritePolicy`].
//!
//! Both are built with [`crate::CachedRepositoryBuilder`] and are immutable
//! afterwards, so they can be shared freely behind an `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use datarepo_core::{
    DataRepoError, DataRepoResult, KeyValue, Lookup, Record, Records, RequestContext,
    WritePolicy,
};
use tracing::{debug, warn};

use crate::cache::RegisteredCache;
use crate::source::{DataWriter, PartialDataWriter};

/// Read side: a registry of caches keyed by field name.
pub struct ReadOnlyCachedRepository<T: Record> {
    caches: HashMap<String, RegisteredCache<T>>,
}

impl<T: Record> ReadOnlyCachedRepository<T> {
    pub(crate) fn new(caches: HashMap<String, RegisteredCache<T>>) -> Self {
        Self { caches }
    }

    fn cache_for(&self, field: &str) -> DataRepoResult<&RegisteredCache<T>> {
        self.caches
            .get(field)
            .ok_or_else(|| DataRepoError::undefined_cache(field))
    }

    /// Look up `id` in the index registered under `field`.
    ///
    /// # Errors
    ///
    /// A dispatch error if no cache is registered for `field`; otherwise
    /// whatever the store or fetcher reported.
    pub async fn find_by_key(
        &self,
        ctx: &RequestContext,
        field: &str,
        id: impl Into<KeyValue>,
    ) -> DataRepoResult<Lookup<Records<T>>> {
        let id = id.into();
        self.cache_for(field)?.get(ctx, &id).await
    }

    /// Batched [`find_by_key`](Self::find_by_key). Duplicates are allowed and
    /// the result is positionally aligned with `ids`.
    pub async fn find_by_keys<I, K>(
        &self,
        ctx: &RequestContext,
        field: &str,
        ids: I,
    ) -> DataRepoResult<Vec<Lookup<Records<T>>>>
    where
        I: IntoIterator<Item = K>,
        K: Into<KeyValue>,
    {
        let ids = datarepo_core::keys(ids);
        self.cache_for(field)?.get_multi(ctx, &ids).await
    }

    /// Registered field names, sorted.
    pub fn fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = self.caches.keys().map(String::as_str).collect();
        fields.sort_unstable();
        fields
    }

    /// The cache registered under `field`, for direct maintenance.
    pub fn cache(&self, field: &str) -> Option<&RegisteredCache<T>> {
        self.caches.get(field)
    }

    fn registered(&self) -> impl Iterator<Item = &RegisteredCache<T>> {
        self.caches.values()
    }
}

/// Read-write repository.
///
/// Writes are fail-closed: when the writer fails, no cache is touched. When
/// the writer succeeds but propagation to a cache fails, the write has
/// committed and the error is still returned; re-read or call
/// [`invalidate`](Self::invalidate) to resynchronize.
pub struct CachedRepository<T: Record> {
    read: ReadOnlyCachedRepository<T>,
    writer: Arc<dyn DataWriter<T>>,
    partial_writer: Option<Arc<dyn PartialDataWriter<T>>>,
    policy: WritePolicy,
}

impl<T: Record> CachedRepository<T> {
    pub(crate) fn new(
        read: ReadOnlyCachedRepository<T>,
        writer: Arc<dyn DataWriter<T>>,
        partial_writer: Option<Arc<dyn PartialDataWriter<T>>>,
        policy: WritePolicy,
    ) -> Self {
        Self {
            read,
            writer,
            partial_writer,
            policy,
        }
    }

    pub fn policy(&self) -> WritePolicy {
        self.policy
    }

    /// The read side on its own.
    pub fn read_only(&self) -> &ReadOnlyCachedRepository<T> {
        &self.read
    }

    pub async fn find_by_key(
        &self,
        ctx: &RequestContext,
        field: &str,
        id: impl Into<KeyValue>,
    ) -> DataRepoResult<Lookup<Records<T>>> {
        self.read.find_by_key(ctx, field, id).await
    }

    pub async fn find_by_keys<I, K>(
        &self,
        ctx: &RequestContext,
        field: &str,
        ids: I,
    ) -> DataRepoResult<Vec<Lookup<Records<T>>>>
    where
        I: IntoIterator<Item = K>,
        K: Into<KeyValue>,
    {
        self.read.find_by_keys(ctx, field, ids).await
    }

    pub fn fields(&self) -> Vec<&str> {
        self.read.fields()
    }

    pub fn cache(&self, field: &str) -> Option<&RegisteredCache<T>> {
        self.read.cache(field)
    }

    /// Insert `value`, then propagate it. The writer may fill in generated
    /// fields; the caches see the value as the writer left it.
    pub async fn create(&self, ctx: &RequestContext, value: &mut T) -> DataRepoResult<()> {
        self.writer.create(ctx, value).await?;
        self.propagate(ctx, value, "create").await
    }

    pub async fn update(&self, ctx: &RequestContext, value: &T) -> DataRepoResult<()> {
        self.writer.update(ctx, value).await?;
        self.propagate(ctx, value, "update").await
    }

    /// Apply the populated fields of `value`. On success `value` holds the
    /// full stored record, which is what the caches are refreshed with.
    ///
    /// # Errors
    ///
    /// A configuration error if the repository was built without a partial
    /// writer.
    pub async fn partial_update(&self, ctx: &RequestContext, value: &mut T) -> DataRepoResult<()> {
        let writer = self
            .partial_writer
            .as_ref()
            .ok_or_else(|| DataRepoError::missing_collaborator("partial data writer"))?;
        writer.partial_update(ctx, value).await?;
        self.propagate(ctx, value, "partial_update").await
    }

    /// Evict the entries derived from `value` from every cache, whatever the
    /// configured policy.
    pub async fn invalidate(&self, ctx: &RequestContext, value: &T) -> DataRepoResult<()> {
        self.apply(ctx, value, WritePolicy::Evict).await
    }

    async fn propagate(
        &self,
        ctx: &RequestContext,
        value: &T,
        op: &'static str,
    ) -> DataRepoResult<()> {
        debug!(op, policy = ?self.policy, caches = self.read.caches.len(), "propagating write");
        self.apply(ctx, value, self.policy).await
    }

    /// Run `policy` over every cache. Every cache is attempted; the first
    /// failure is returned.
    async fn apply(
        &self,
        ctx: &RequestContext,
        value: &T,
        policy: WritePolicy,
    ) -> DataRepoResult<()> {
        let mut first_err: Option<DataRepoError> = None;
        for cache in self.read.registered() {
            let applied = match policy {
                WritePolicy::Evict => cache.delete_value(ctx, value).await,
                WritePolicy::Update => cache.set(ctx, value).await,
            };
            if let Err(e) = applied {
                warn!(
                    field = cache.field(),
                    policy = ?policy,
                    error = %e,
                    "cache propagation failed"
                );
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
