//! Layered cache store.
//!
//! Reads walk the layers in order and stop at the first hit. Writes and
//! deletes go to every layer so the layers never disagree about a key the
//! engine has touched.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use datarepo_core::{ConfigError, DataRepoError, DataRepoResult, RequestContext, StoreError};
use tracing::warn;

use super::traits::CacheStore;

/// A cache store made of an ordered chain of other stores.
///
/// # Example
///
/// ```ignore
/// let local: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::with_capacity(1_000));
/// let shared: Arc<dyn CacheStore> = Arc::new(redis_store);
/// let store = CompositeCacheStore::new(vec![local, shared])?;
/// ```
pub struct CompositeCacheStore {
    layers: Vec<Arc<dyn CacheStore>>,
}

impl CompositeCacheStore {
    /// Chain `layers`, fastest first. Fails on an empty chain.
    pub fn new(layers: Vec<Arc<dyn CacheStore>>) -> Result<Self, ConfigError> {
        if layers.is_empty() {
            return Err(ConfigError::NoDelegates);
        }
        Ok(Self { layers })
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}

#[async_trait]
impl CacheStore for CompositeCacheStore {
    async fn get(&self, ctx: &RequestContext, key: &str) -> DataRepoResult<Option<Vec<u8>>> {
        let mut last_err: Option<DataRepoError> = None;
        for (layer, store) in self.layers.iter().enumerate() {
            match store.get(ctx, key).await {
                Ok(Some(payload)) => return Ok(Some(payload)),
                Ok(None) => {}
                Err(e) => {
                    warn!(layer, key, error = %e, "cache layer read failed, trying next layer");
                    last_err = Some(e);
                }
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    async fn get_multi(
        &self,
        ctx: &RequestContext,
        keys: &[String],
    ) -> DataRepoResult<Vec<Option<Vec<u8>>>> {
        let mut found: Vec<Option<Vec<u8>>> = vec![None; keys.len()];
        // positions in `keys` no layer has answered yet
        let mut pending: Vec<usize> = (0..keys.len()).collect();
        let mut last_err: Option<DataRepoError> = None;

        for (layer, store) in self.layers.iter().enumerate() {
            if pending.is_empty() {
                break;
            }
            let layer_keys: Vec<String> = pending.iter().map(|&i| keys[i].clone()).collect();
            match store.get_multi(ctx, &layer_keys).await {
                Ok(payloads) if payloads.len() != layer_keys.len() => {
                    let e: DataRepoError = StoreError::Backend {
                        store: format!("layer {layer}"),
                        reason: format!(
                            "{} payloads for {} keys",
                            payloads.len(),
                            layer_keys.len()
                        ),
                    }
                    .into();
                    warn!(
                        layer,
                        error = %e,
                        "cache layer batch read misaligned, trying next layer"
                    );
                    last_err = Some(e);
                }
                Ok(payloads) => {
                    let mut still_pending = Vec::with_capacity(pending.len());
                    for (&position, payload) in pending.iter().zip(payloads) {
                        match payload {
                            Some(p) => found[position] = Some(p),
                            None => still_pending.push(position),
                        }
                    }
                    pending = still_pending;
                }
                Err(e) => {
                    warn!(
                        layer,
                        keys = layer_keys.len(),
                        error = %e,
                        "cache layer batch read failed, trying next layer"
                    );
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) if !pending.is_empty() => Err(e),
            _ => Ok(found),
        }
    }

    async fn set(
        &self,
        ctx: &RequestContext,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> DataRepoResult<()> {
        let mut last_err = None;
        for (layer, store) in self.layers.iter().enumerate() {
            if let Err(e) = store.set(ctx, key, value.clone(), ttl).await {
                warn!(layer, key, error = %e, "cache layer write failed");
                last_err = Some(e);
            }
        }
        last_err.map_or(Ok(()), Err)
    }

    async fn delete(&self, ctx: &RequestContext, key: &str) -> DataRepoResult<()> {
        let mut last_err = None;
        for (layer, store) in self.layers.iter().enumerate() {
            if let Err(e) = store.delete(ctx, key).await {
                warn!(layer, key, error = %e, "cache layer delete failed");
                last_err = Some(e);
            }
        }
        last_err.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryCacheStore, StatsCacheStore};

    /// A layer that fails every call.
    struct BrokenStore;

    fn broken() -> DataRepoError {
        StoreError::Backend {
            store: "broken".to_string(),
            reason: "connection refused".to_string(),
        }
        .into()
    }

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _: &RequestContext, _: &str) -> DataRepoResult<Option<Vec<u8>>> {
            Err(broken())
        }

        async fn set(
            &self,
            _: &RequestContext,
            _: &str,
            _: Vec<u8>,
            _: Duration,
        ) -> DataRepoResult<()> {
            Err(broken())
        }

        async fn delete(&self, _: &RequestContext, _: &str) -> DataRepoResult<()> {
            Err(broken())
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::background()
    }

    fn stats_layer() -> Arc<StatsCacheStore> {
        Arc::new(StatsCacheStore::new(Arc::new(MemoryCacheStore::new())))
    }

    #[test]
    fn test_empty_chain_rejected() {
        assert_eq!(
            CompositeCacheStore::new(vec![]).err(),
            Some(ConfigError::NoDelegates)
        );
    }

    #[tokio::test]
    async fn test_first_hit_wins_and_later_layers_are_skipped() {
        let first = stats_layer();
        let second = stats_layer();
        let store = CompositeCacheStore::new(vec![
            first.clone() as Arc<dyn CacheStore>,
            second.clone(),
        ])
        .unwrap();

        first
            .set(&ctx(), "k", b"fast".to_vec(), Duration::ZERO)
            .await
            .unwrap();
        second
            .set(&ctx(), "k", b"slow".to_vec(), Duration::ZERO)
            .await
            .unwrap();
        second.clear_stats();

        assert_eq!(store.get(&ctx(), "k").await.unwrap(), Some(b"fast".to_vec()));
        assert_eq!(first.hits(), 1);
        assert_eq!(second.hits() + second.misses(), 0);
    }

    #[tokio::test]
    async fn test_miss_falls_through_to_next_layer() {
        let first = stats_layer();
        let second = stats_layer();
        let store = CompositeCacheStore::new(vec![
            first.clone() as Arc<dyn CacheStore>,
            second.clone(),
        ])
        .unwrap();
        second
            .set(&ctx(), "k", b"slow".to_vec(), Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(store.get(&ctx(), "k").await.unwrap(), Some(b"slow".to_vec()));
        assert_eq!(first.misses(), 1);
        assert_eq!(second.hits(), 1);
    }

    #[tokio::test]
    async fn test_writes_fan_out_to_every_layer() {
        let first = stats_layer();
        let second = stats_layer();
        let store = CompositeCacheStore::new(vec![
            first.clone() as Arc<dyn CacheStore>,
            second.clone(),
        ])
        .unwrap();

        store
            .set(&ctx(), "k", b"v".to_vec(), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(first.sets(), 1);
        assert_eq!(second.sets(), 1);

        store.delete(&ctx(), "k").await.unwrap();
        assert_eq!(first.deletes(), 1);
        assert_eq!(second.deletes(), 1);
    }

    #[tokio::test]
    async fn test_get_multi_only_asks_later_layers_for_remaining_keys() {
        let first = stats_layer();
        let second = stats_layer();
        let store = CompositeCacheStore::new(vec![
            first.clone() as Arc<dyn CacheStore>,
            second.clone(),
        ])
        .unwrap();
        first
            .set(&ctx(), "a", b"1".to_vec(), Duration::ZERO)
            .await
            .unwrap();
        second
            .set(&ctx(), "b", b"2".to_vec(), Duration::ZERO)
            .await
            .unwrap();

        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let found = store.get_multi(&ctx(), &keys).await.unwrap();
        assert_eq!(found, vec![Some(b"1".to_vec()), Some(b"2".to_vec()), None]);

        assert_eq!(first.hits(), 1);
        assert_eq!(first.misses(), 2);
        // "a" was never asked of the second layer
        assert_eq!(second.hits(), 1);
        assert_eq!(second.misses(), 1);
    }

    #[tokio::test]
    async fn test_broken_layer_does_not_mask_a_later_hit() {
        let healthy = stats_layer();
        healthy
            .set(&ctx(), "k", b"v".to_vec(), Duration::ZERO)
            .await
            .unwrap();
        let store = CompositeCacheStore::new(vec![
            Arc::new(BrokenStore) as Arc<dyn CacheStore>,
            healthy.clone(),
        ])
        .unwrap();

        assert_eq!(store.get(&ctx(), "k").await.unwrap(), Some(b"v".to_vec()));
        // no layer has "missing": the broken layer's error surfaces
        assert_eq!(store.get(&ctx(), "missing").await.unwrap_err(), broken());
    }

    #[tokio::test]
    async fn test_write_reaches_healthy_layers_and_reports_failure() {
        let healthy = stats_layer();
        let store = CompositeCacheStore::new(vec![
            Arc::new(BrokenStore) as Arc<dyn CacheStore>,
            healthy.clone(),
        ])
        .unwrap();

        assert!(store
            .set(&ctx(), "k", b"v".to_vec(), Duration::ZERO)
            .await
            .is_err());
        assert_eq!(healthy.sets(), 1);

        assert!(store.delete(&ctx(), "k").await.is_err());
        assert_eq!(healthy.deletes(), 1);
        assert_eq!(store.layer_count(), 2);
    }
}
