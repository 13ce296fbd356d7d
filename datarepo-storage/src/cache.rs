//! A complete read-through index.
//!
//! An [`IndexCache`] binds one handler to the store it caches in and the
//! fetcher it falls back to. Stores and fetchers are shared: several caches,
//! even across repositories, may point at the same ones.

use std::marker::PhantomData;
use std::sync::Arc;

use datarepo_core::{DataRepoResult, KeyValue, Lookup, Record, Records, RequestContext};

use crate::handler::{CacheHandler, NonUniqueKeyHandler, UniqueKeyHandler};
use crate::source::DataFetcher;
use crate::store::CacheStore;

/// One index: handler, store and fetcher.
pub struct IndexCache<T: Record, H: CacheHandler<T>> {
    handler: H,
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn DataFetcher<H::Value>>,
    _record: PhantomData<fn() -> T>,
}

pub type UniqueKeyCache<T> = IndexCache<T, UniqueKeyHandler<T>>;
pub type NonUniqueKeyCache<T> = IndexCache<T, NonUniqueKeyHandler<T>>;

impl<T: Record, H: CacheHandler<T>> IndexCache<T, H> {
    pub fn new(
        handler: H,
        store: Arc<dyn CacheStore>,
        fetcher: Arc<dyn DataFetcher<H::Value>>,
    ) -> Self {
        Self {
            handler,
            store,
            fetcher,
            _record: PhantomData,
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Field label this cache is registered under.
    pub fn field(&self) -> &str {
        self.handler.key_space().field()
    }

    pub async fn get(
        &self,
        ctx: &RequestContext,
        id: &KeyValue,
    ) -> DataRepoResult<Lookup<H::Value>> {
        self.handler
            .get(ctx, self.store.as_ref(), id, self.fetcher.as_ref())
            .await
    }

    pub async fn get_multi(
        &self,
        ctx: &RequestContext,
        ids: &[KeyValue],
    ) -> DataRepoResult<Vec<Lookup<H::Value>>> {
        self.handler
            .get_multi(ctx, self.store.as_ref(), ids, self.fetcher.as_ref())
            .await
    }

    pub async fn set(&self, ctx: &RequestContext, value: &T) -> DataRepoResult<()> {
        self.handler.set(ctx, self.store.as_ref(), value).await
    }

    pub async fn delete_value(&self, ctx: &RequestContext, value: &T) -> DataRepoResult<()> {
        self.handler
            .delete_value(ctx, self.store.as_ref(), value)
            .await
    }

    pub async fn delete(&self, ctx: &RequestContext, id: &KeyValue) -> DataRepoResult<()> {
        self.handler.delete(ctx, self.store.as_ref(), id).await
    }
}

/// A cache as held by a repository, either kind.
///
/// Reads come back as [`Records`], `Single` from a unique index and
/// `Sequence` from a non-unique one.
pub enum RegisteredCache<T: Record> {
    Unique(UniqueKeyCache<T>),
    NonUnique(NonUniqueKeyCache<T>),
}

impl<T: Record> RegisteredCache<T> {
    pub fn field(&self) -> &str {
        match self {
            Self::Unique(cache) => cache.field(),
            Self::NonUnique(cache) => cache.field(),
        }
    }

    pub fn is_unique(&self) -> bool {
        matches!(self, Self::Unique(_))
    }

    pub fn as_unique(&self) -> Option<&UniqueKeyCache<T>> {
        match self {
            Self::Unique(cache) => Some(cache),
            Self::NonUnique(_) => None,
        }
    }

    pub fn as_non_unique(&self) -> Option<&NonUniqueKeyCache<T>> {
        match self {
            Self::NonUnique(cache) => Some(cache),
            Self::Unique(_) => None,
        }
    }

    pub async fn get(
        &self,
        ctx: &RequestContext,
        id: &KeyValue,
    ) -> DataRepoResult<Lookup<Records<T>>> {
        Ok(match self {
            Self::Unique(cache) => cache.get(ctx, id).await?.map(Records::Single),
            Self::NonUnique(cache) => cache.get(ctx, id).await?.map(Records::Sequence),
        })
    }

    pub async fn get_multi(
        &self,
        ctx: &RequestContext,
        ids: &[KeyValue],
    ) -> DataRepoResult<Vec<Lookup<Records<T>>>> {
        Ok(match self {
            Self::Unique(cache) => cache
                .get_multi(ctx, ids)
                .await?
                .into_iter()
                .map(|found| found.map(Records::Single))
                .collect(),
            Self::NonUnique(cache) => cache
                .get_multi(ctx, ids)
                .await?
                .into_iter()
                .map(|found| found.map(Records::Sequence))
                .collect(),
        })
    }

    pub async fn set(&self, ctx: &RequestContext, value: &T) -> DataRepoResult<()> {
        match self {
            Self::Unique(cache) => cache.set(ctx, value).await,
            Self::NonUnique(cache) => cache.set(ctx, value).await,
        }
    }

    pub async fn delete_value(&self, ctx: &RequestContext, value: &T) -> DataRepoResult<()> {
        match self {
            Self::Unique(cache) => cache.delete_value(ctx, value).await,
            Self::NonUnique(cache) => cache.delete_value(ctx, value).await,
        }
    }

    pub async fn delete(&self, ctx: &RequestContext, id: &KeyValue) -> DataRepoResult<()> {
        match self {
            Self::Unique(cache) => cache.delete(ctx, id).await,
            Self::NonUnique(cache) => cache.delete(ctx, id).await,
        }
    }
}
