use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use datarepo_core::{DataRepoResult, KeyValue, Lookup, RequestContext};

use super::{DataFetcher, DataWriter, PartialDataWriter};

/// Counts the ids a fetcher was asked for.
///
/// `reads` is the number of ids sent to the delegate (one per `find_by_key`,
/// `ids.len()` per `find_by_keys`); `calls` is the number of round-trips.
pub struct StatsDataFetcher<V: Send + Sync + 'static> {
    delegate: Arc<dyn DataFetcher<V>>,
    reads: AtomicU64,
    calls: AtomicU64,
}

impl<V: Send + Sync + 'static> StatsDataFetcher<V> {
    pub fn new(delegate: Arc<dyn DataFetcher<V>>) -> Self {
        Self {
            delegate,
            reads: AtomicU64::new(0),
            calls: AtomicU64::new(0),
        }
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn clear_stats(&self) {
        self.reads.store(0, Ordering::Relaxed);
        self.calls.store(0, Ordering::Relaxed);
    }

    fn record(&self, ids: usize) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.reads.fetch_add(ids as u64, Ordering::Relaxed);
    }
}

#[async_trait]
impl<V: Send + Sync + 'static> DataFetcher<V> for StatsDataFetcher<V> {
    async fn find_by_key(
        &self,
        ctx: &RequestContext,
        field: &str,
        id: &KeyValue,
    ) -> DataRepoResult<Lookup<V>> {
        self.record(1);
        self.delegate.find_by_key(ctx, field, id).await
    }

    async fn find_by_keys(
        &self,
        ctx: &RequestContext,
        field: &str,
        ids: &[KeyValue],
    ) -> DataRepoResult<Vec<Lookup<V>>> {
        self.record(ids.len());
        self.delegate.find_by_keys(ctx, field, ids).await
    }
}

/// Counts writer calls by kind. Failed calls are counted too.
pub struct StatsDataWriter<W: ?Sized> {
    delegate: Arc<W>,
    creates: AtomicU64,
    updates: AtomicU64,
    partial_updates: AtomicU64,
}

impl<W: ?Sized> StatsDataWriter<W> {
    pub fn new(delegate: Arc<W>) -> Self {
        Self {
            delegate,
            creates: AtomicU64::new(0),
            updates: AtomicU64::new(0),
            partial_updates: AtomicU64::new(0),
        }
    }

    pub fn creates(&self) -> u64 {
        self.creates.load(Ordering::Relaxed)
    }

    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }

    pub fn partial_updates(&self) -> u64 {
        self.partial_updates.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<T, W> DataWriter<T> for StatsDataWriter<W>
where
    T: Send + Sync + 'static,
    W: DataWriter<T> + ?Sized,
{
    async fn create(&self, ctx: &RequestContext, value: &mut T) -> DataRepoResult<()> {
        self.creates.fetch_add(1, Ordering::Relaxed);
        self.delegate.create(ctx, value).await
    }

    async fn update(&self, ctx: &RequestContext, value: &T) -> DataRepoResult<()> {
        self.updates.fetch_add(1, Ordering::Relaxed);
        self.delegate.update(ctx, value).await
    }
}

#[async_trait]
impl<T, W> PartialDataWriter<T> for StatsDataWriter<W>
where
    T: Send + Sync + 'static,
    W: PartialDataWriter<T> + ?Sized,
{
    async fn partial_update(&self, ctx: &RequestContext, value: &mut T) -> DataRepoResult<()> {
        self.partial_updates.fetch_add(1, Ordering::Relaxed);
        self.delegate.partial_update(ctx, value).await
    }
}
