use async_trait::async_trait;
use datarepo_core::{
    DataRepoResult, KeyExtractor, NonUniqueKeyCacheDefinition, Record, RequestContext,
};
use tracing::debug;

use super::{CacheHandler, KeySpace};
use crate::codec;
use crate::store::CacheStore;

/// Handler for an index where each key maps to a group of records.
///
/// The group is cached as one entry. Members are told apart by the sub-key,
/// which is what `set` matches on when refreshing a cached group.
#[derive(Debug, Clone)]
pub struct NonUniqueKeyHandler<T> {
    space: KeySpace<T>,
    sub_key: KeyExtractor<T>,
}

impl<T: Record> NonUniqueKeyHandler<T> {
    pub fn new(definition: &NonUniqueKeyCacheDefinition<T>) -> Self {
        Self {
            space: KeySpace::new(
                definition.key_prefix.clone(),
                definition.key.clone(),
                definition.expiration,
            ),
            sub_key: definition.sub_key.clone(),
        }
    }

    pub fn sub_key_field(&self) -> &str {
        self.sub_key.field()
    }

    /// Replace every member sharing `value`'s sub-key, or append `value` if
    /// none does.
    fn merge(&self, group: &mut Vec<T>, value: &T) {
        let sub = self.sub_key.extract(value);
        let mut replaced = false;
        for member in group.iter_mut() {
            if self.sub_key.extract(member) == sub {
                *member = value.clone();
                replaced = true;
            }
        }
        if !replaced {
            group.push(value.clone());
        }
    }
}

#[async_trait]
impl<T: Record> CacheHandler<T> for NonUniqueKeyHandler<T> {
    type Value = Vec<T>;

    fn key_space(&self) -> &KeySpace<T> {
        &self.space
    }

    /// Refresh an already cached group with `value`.
    ///
    /// Groups are only ever populated by the read path: if no group is cached
    /// for the key, nothing is written, since a group built from one write
    /// would be missing every other member. A blank key is a no-op too.
    async fn set(
        &self,
        ctx: &RequestContext,
        store: &dyn CacheStore,
        value: &T,
    ) -> DataRepoResult<()> {
        let id = self.space.key_of(value);
        if id.is_blank() {
            return Ok(());
        }

        let cache_key = self.space.cache_key(&id);
        let Some(payload) = store.get(ctx, &cache_key).await? else {
            debug!(key = %cache_key, "group not cached, skipping refresh");
            return Ok(());
        };

        let mut group: Vec<T> = codec::decode(&cache_key, &payload)?;
        self.merge(&mut group, value);
        let payload = codec::encode(&cache_key, &group)?;
        store
            .set(ctx, &cache_key, payload, self.space.expiration())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::source::DataFetcher;
    use crate::store::{CacheStats, MemoryCacheStore, StatsCacheStore};
    use datarepo_core::{KeyValue, Lookup};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Post {
        id: u64,
        topic: String,
        body: String,
    }

    fn post(id: u64, topic: &str, body: &str) -> Post {
        Post {
            id,
            topic: topic.to_string(),
            body: body.to_string(),
        }
    }

    /// Every topic has posts 1 and 2 in the source of truth.
    struct Topics;

    #[async_trait]
    impl DataFetcher<Vec<Post>> for Topics {
        async fn find_by_key(
            &self,
            _ctx: &RequestContext,
            _field: &str,
            id: &KeyValue,
        ) -> DataRepoResult<Lookup<Vec<Post>>> {
            let topic = id.to_string();
            Ok(Lookup::Value(vec![
                post(1, &topic, "one"),
                post(2, &topic, "two"),
            ]))
        }
    }

    fn handler() -> NonUniqueKeyHandler<Post> {
        NonUniqueKeyHandler::new(&NonUniqueKeyCacheDefinition::new(
            "t:",
            KeyExtractor::new("topic", |p: &Post| p.topic.clone()),
            KeyExtractor::new("id", |p: &Post| p.id),
            Duration::from_secs(60),
        ))
    }

    async fn cached_group(store: &dyn CacheStore, key: &str) -> Option<Vec<Post>> {
        let payload = store
            .get(&RequestContext::background(), key)
            .await
            .unwrap()?;
        Some(codec::decode(key, &payload).unwrap())
    }

    async fn warm(handler: &NonUniqueKeyHandler<Post>, store: &dyn CacheStore, topic: &str) {
        handler
            .get(
                &RequestContext::background(),
                store,
                &KeyValue::from(topic),
                &Topics,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_set_on_absent_group_is_noop() {
        let handler = handler();
        let store = StatsCacheStore::new(Arc::new(MemoryCacheStore::new()));
        let ctx = RequestContext::background();

        handler.set(&ctx, &store, &post(3, "rust", "new")).await.unwrap();
        assert_eq!(cached_group(&store, "t:rust").await, None);
        assert_eq!(store.sets(), 0);
    }

    #[tokio::test]
    async fn test_set_replaces_matching_member_in_place() {
        let handler = handler();
        let store = MemoryCacheStore::new();
        let ctx = RequestContext::background();
        warm(&handler, &store, "rust").await;

        handler
            .set(&ctx, &store, &post(1, "rust", "edited"))
            .await
            .unwrap();
        assert_eq!(
            cached_group(&store, "t:rust").await,
            Some(vec![post(1, "rust", "edited"), post(2, "rust", "two")])
        );
    }

    #[tokio::test]
    async fn test_set_appends_new_member() {
        let handler = handler();
        let store = MemoryCacheStore::new();
        let ctx = RequestContext::background();
        warm(&handler, &store, "rust").await;

        handler.set(&ctx, &store, &post(3, "rust", "three")).await.unwrap();
        let group = cached_group(&store, "t:rust").await.unwrap();
        assert_eq!(group.len(), 3);
        assert_eq!(group[2], post(3, "rust", "three"));
    }

    #[tokio::test]
    async fn test_set_with_blank_key_is_noop() {
        let handler = handler();
        let store = StatsCacheStore::new(Arc::new(MemoryCacheStore::new()));
        let ctx = RequestContext::background();

        handler.set(&ctx, &store, &post(1, "", "orphan")).await.unwrap();
        // not even read
        assert_eq!(store.snapshot(), CacheStats::default());
    }

    #[tokio::test]
    async fn test_set_returns_store_error() {
        let handler = handler();
        let store = MemoryCacheStore::new();
        let (cancel, ctx) = RequestContext::cancellable();
        cancel.cancel();

        assert!(handler
            .set(&ctx, &store, &post(1, "rust", "x"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_delete_evicts_whole_group() {
        let handler = handler();
        let store = MemoryCacheStore::new();
        let ctx = RequestContext::background();
        warm(&handler, &store, "rust").await;
        assert!(store.contains_key("t:rust"));

        handler
            .delete_value(&ctx, &store, &post(2, "rust", "two"))
            .await
            .unwrap();
        assert!(!store.contains_key("t:rust"));
    }

    #[tokio::test]
    async fn test_round_trip_single_member() {
        let handler = handler();
        let store = MemoryCacheStore::new();
        let ctx = RequestContext::background();
        store
            .set(
                &ctx,
                "t:go",
                codec::encode("t:go", &Vec::<Post>::new()).unwrap(),
                Duration::ZERO,
            )
            .await
            .unwrap();

        handler.set(&ctx, &store, &post(9, "go", "only")).await.unwrap();
        let found = handler
            .get(&ctx, &store, &KeyValue::from("go"), &Topics)
            .await
            .unwrap();
        assert_eq!(found, Lookup::Value(vec![post(9, "go", "only")]));
        assert_eq!(handler.sub_key_field(), "id");
    }
}
