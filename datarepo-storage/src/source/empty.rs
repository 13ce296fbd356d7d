use std::sync::Arc;

use async_trait::async_trait;
use datarepo_core::{DataRepoResult, KeyValue, Lookup, RequestContext};

use super::DataFetcher;

/// Wraps a group fetcher so that "no records for this key" comes back as an
/// empty group instead of `Empty`.
///
/// The read path only writes back non-empty results, so without this wrapper
/// a key with no records misses the cache on every lookup. With it, the empty
/// group is cached like any other and the next lookup is a hit.
pub struct EmptyResultFetcher<T: Send + Sync + 'static> {
    delegate: Arc<dyn DataFetcher<Vec<T>>>,
}

impl<T: Send + Sync + 'static> EmptyResultFetcher<T> {
    pub fn new(delegate: Arc<dyn DataFetcher<Vec<T>>>) -> Self {
        Self { delegate }
    }
}

fn fill<T>(found: Lookup<Vec<T>>) -> Lookup<Vec<T>> {
    match found {
        Lookup::Empty => Lookup::Value(Vec::new()),
        value => value,
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> DataFetcher<Vec<T>> for EmptyResultFetcher<T> {
    async fn find_by_key(
        &self,
        ctx: &RequestContext,
        field: &str,
        id: &KeyValue,
    ) -> DataRepoResult<Lookup<Vec<T>>> {
        Ok(fill(self.delegate.find_by_key(ctx, field, id).await?))
    }

    async fn find_by_keys(
        &self,
        ctx: &RequestContext,
        field: &str,
        ids: &[KeyValue],
    ) -> DataRepoResult<Vec<Lookup<Vec<T>>>> {
        let found = self.delegate.find_by_keys(ctx, field, ids).await?;
        Ok(found.into_iter().map(fill).collect())
    }
}
