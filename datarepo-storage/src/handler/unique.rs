use async_trait::async_trait;
use datarepo_core::{DataRepoResult, Record, RequestContext, UniqueKeyCacheDefinition};

use super::{CacheHandler, KeySpace};
use crate::codec;
use crate::store::CacheStore;

/// Handler for an index where each key maps to at most one record.
#[derive(Debug, Clone)]
pub struct UniqueKeyHandler<T> {
    space: KeySpace<T>,
}

impl<T: Record> UniqueKeyHandler<T> {
    pub fn new(definition: &UniqueKeyCacheDefinition<T>) -> Self {
        Self {
            space: KeySpace::new(
                definition.key_prefix.clone(),
                definition.key.clone(),
                definition.expiration,
            ),
        }
    }
}

#[async_trait]
impl<T: Record> CacheHandler<T> for UniqueKeyHandler<T> {
    type Value = T;

    fn key_space(&self) -> &KeySpace<T> {
        &self.space
    }

    /// Overwrite the entry for `value`'s key with `value`.
    async fn set(
        &self,
        ctx: &RequestContext,
        store: &dyn CacheStore,
        value: &T,
    ) -> DataRepoResult<()> {
        let cache_key = self.space.cache_key_for(value);
        let payload = codec::encode(&cache_key, value)?;
        store
            .set(ctx, &cache_key, payload, self.space.expiration())
            .await
    }
}
