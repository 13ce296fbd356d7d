//! Source-of-truth contracts.
//!
//! The engine reads the backing store through a [`DataFetcher`] and writes it
//! through a [`DataWriter`]. Both are keyed by a field name, the same label the
//! cache was registered under, so one fetcher can serve several indexes.
//!
//! Wrappers:
//! - [`EmptyResultFetcher`]: turns "no records" into a cacheable empty group
//! - [`StatsDataFetcher`] and [`StatsDataWriter`]: call counters for tests
//!   and diagnostics

mod empty;
mod stats;

pub use empty::EmptyResultFetcher;
pub use stats::{StatsDataFetcher, StatsDataWriter};

use async_trait::async_trait;
use datarepo_core::{DataRepoResult, KeyValue, Lookup, RequestContext};

/// Read access to the backing store.
///
/// `V` is the shape one key resolves to: a record for unique indexes, a
/// `Vec` of records for non-unique ones.
#[async_trait]
pub trait DataFetcher<V: Send + Sync + 'static>: Send + Sync {
    /// Look up the value for `id` in the index named `field`.
    async fn find_by_key(
        &self,
        ctx: &RequestContext,
        field: &str,
        id: &KeyValue,
    ) -> DataRepoResult<Lookup<V>>;

    /// Look up several ids at once. The result must be positionally aligned
    /// with `ids`.
    ///
    /// The default implementation issues one `find_by_key` per id. Sources
    /// that can answer a batch in one round-trip should override it.
    async fn find_by_keys(
        &self,
        ctx: &RequestContext,
        field: &str,
        ids: &[KeyValue],
    ) -> DataRepoResult<Vec<Lookup<V>>> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            found.push(self.find_by_key(ctx, field, id).await?);
        }
        Ok(found)
    }
}

/// Write access to the backing store.
#[async_trait]
pub trait DataWriter<T: Send + Sync + 'static>: Send + Sync {
    /// Insert `value`. The writer may fill in generated fields (ids,
    /// timestamps) before returning.
    async fn create(&self, ctx: &RequestContext, value: &mut T) -> DataRepoResult<()>;

    async fn update(&self, ctx: &RequestContext, value: &T) -> DataRepoResult<()>;
}

/// A writer that can apply a partial record.
#[async_trait]
pub trait PartialDataWriter<T: Send + Sync + 'static>: DataWriter<T> {
    /// Apply only the populated fields of `value`. On success `value` must hold
    /// the full record as stored, since it is what the caches are refreshed
    /// with.
    async fn partial_update(&self, ctx: &RequestContext, value: &mut T) -> DataRepoResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct SquareFetcher {
        known: HashMap<KeyValue, u64>,
    }

    #[async_trait]
    impl DataFetcher<u64> for SquareFetcher {
        async fn find_by_key(
            &self,
            ctx: &RequestContext,
            _field: &str,
            id: &KeyValue,
        ) -> DataRepoResult<Lookup<u64>> {
            ctx.check()?;
            Ok(self.known.get(id).copied().into())
        }
    }

    #[tokio::test]
    async fn test_default_find_by_keys_is_positional() {
        let fetcher = SquareFetcher {
            known: HashMap::from([(KeyValue::Uint(2), 4), (KeyValue::Uint(3), 9)]),
        };
        let ids = datarepo_core::keys([3u64, 1, 2, 3]);
        let found = fetcher
            .find_by_keys(&RequestContext::background(), "n", &ids)
            .await
            .unwrap();
        assert_eq!(
            found,
            vec![
                Lookup::Value(9),
                Lookup::Empty,
                Lookup::Value(4),
                Lookup::Value(9)
            ]
        );
    }

    #[tokio::test]
    async fn test_default_find_by_keys_stops_on_error() {
        let fetcher = SquareFetcher {
            known: HashMap::new(),
        };
        let (handle, ctx) = RequestContext::cancellable();
        handle.cancel();
        let ids = datarepo_core::keys([1u64]);
        assert!(fetcher.find_by_keys(&ctx, "n", &ids).await.is_err());
    }
}
