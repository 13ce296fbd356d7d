//! datarepo Core - Data Types
//!
//! Pure data structures shared by the engine and its collaborators: errors,
//! lookup results, index keys, record capabilities, cache definitions and
//! configuration. This crate contains no caching logic.

pub mod config;
pub mod context;
pub mod definition;
pub mod error;
pub mod key;
pub mod lookup;
pub mod record;

pub use config::{IndexConfig, IndexKind, RepositoryConfig, WritePolicy};
pub use context::{CancelHandle, RequestContext};
pub use definition::{NonUniqueKeyCacheDefinition, UniqueKeyCacheDefinition};
pub use error::{
    ConfigError, ContextError, DataRepoError, DataRepoResult, DispatchError, FetchError,
    StoreError, WriteError,
};
pub use key::{keys, KeyValue};
pub use lookup::{collect_sequences, collect_single, Lookup, Records};
pub use record::{KeyExtractor, Record};
