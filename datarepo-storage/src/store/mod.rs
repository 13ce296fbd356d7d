//! Cache stores.
//!
//! The engine talks to cache backends only through [`CacheStore`]. This
//! module holds the trait, two bundled backends and two decorators:
//!
//! - [`MemoryCacheStore`]: process-local map with per-entry TTL
//! - [`NoCacheStore`]: stores nothing, every read misses
//! - [`CompositeCacheStore`]: ordered chain of stores, first hit wins
//! - [`StatsCacheStore`]: counts hits, misses, sets and deletes

mod composite;
mod memory;
mod noop;
mod stats;
mod traits;

pub use composite::CompositeCacheStore;
pub use memory::MemoryCacheStore;
pub use noop::NoCacheStore;
pub use stats::StatsCacheStore;
pub use traits::{CacheStats, CacheStore};
