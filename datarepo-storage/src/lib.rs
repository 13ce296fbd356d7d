//! datarepo Storage - Cache-Aside Repository Engine
//!
//! Combines named lookup indexes with pluggable cache stores. Reads go to the
//! cache first and fall back to a data fetcher on a miss, writing what was
//! fetched back into the cache. Batched reads hit the fetcher once per batch
//! with repeated keys deduplicated. Writes go to a data writer and are then
//! propagated to every cache by evicting or updating the affected entries.
//!
//! Control flow, outermost first:
//! builder → repository → cache → handler → (store | fetcher).

pub mod builder;
pub mod cache;
pub mod codec;
pub mod handler;
pub mod repository;
pub mod source;
pub mod store;

pub use builder::CachedRepositoryBuilder;
pub use cache::{IndexCache, NonUniqueKeyCache, RegisteredCache, UniqueKeyCache};
pub use handler::{CacheHandler, KeySpace, NonUniqueKeyHandler, UniqueKeyHandler};
pub use repository::{CachedRepository, ReadOnlyCachedRepository};
pub use source::{
    DataFetcher, DataWriter, EmptyResultFetcher, PartialDataWriter, StatsDataFetcher,
    StatsDataWriter,
};
pub use store::{
    CacheStats, CacheStore, CompositeCacheStore, MemoryCacheStore, NoCacheStore, StatsCacheStore,
};

// Re-export core types so most callers need only this crate.
pub use datarepo_core::{
    keys, CancelHandle, ConfigError, DataRepoError, DataRepoResult, IndexConfig, IndexKind,
    KeyExtractor, KeyValue, Lookup, NonUniqueKeyCacheDefinition, Record, Records,
    RepositoryConfig, RequestContext, UniqueKeyCacheDefinition, WritePolicy,
};
