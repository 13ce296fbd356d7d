//! Repository builder.
//!
//! Registration problems (an invalid definition, a field registered twice)
//! are recorded as they happen and the first one is returned by `build`, so a
//! repository is either fully valid or never returned.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use datarepo_core::{
    ConfigError, DataRepoError, DataRepoResult, IndexConfig, IndexKind,
    NonUniqueKeyCacheDefinition, Record, RepositoryConfig, UniqueKeyCacheDefinition, WritePolicy,
};
use tracing::debug;

use crate::cache::{IndexCache, RegisteredCache};
use crate::handler::{NonUniqueKeyHandler, UniqueKeyHandler};
use crate::repository::{CachedRepository, ReadOnlyCachedRepository};
use crate::source::{DataFetcher, DataWriter, EmptyResultFetcher, PartialDataWriter};
use crate::store::CacheStore;

/// Builder for [`ReadOnlyCachedRepository`] and [`CachedRepository`].
///
/// # Example
///
/// ```ignore
/// let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new());
/// let repo = CachedRepositoryBuilder::new()
///     .with_unique_key_cache(by_id, Arc::clone(&store))
///     .with_non_unique_key_cache(by_author, store)
///     .with_unique_key_data_fetcher(source.clone())
///     .with_non_unique_key_data_fetcher(source.clone())
///     .with_data_writer(source)
///     .with_write_policy(WritePolicy::Evict)
///     .build()?;
/// ```
pub struct CachedRepositoryBuilder<T: Record> {
    unique: Vec<(UniqueKeyCacheDefinition<T>, Arc<dyn CacheStore>)>,
    non_unique: Vec<(NonUniqueKeyCacheDefinition<T>, Arc<dyn CacheStore>)>,
    fields: HashSet<String>,
    unique_fetcher: Option<Arc<dyn DataFetcher<T>>>,
    non_unique_fetcher: Option<Arc<dyn DataFetcher<Vec<T>>>>,
    writer: Option<Arc<dyn DataWriter<T>>>,
    partial_writer: Option<Arc<dyn PartialDataWriter<T>>>,
    policy: WritePolicy,
    config: Option<RepositoryConfig>,
    error: Option<ConfigError>,
}

impl<T: Record> Default for CachedRepositoryBuilder<T> {
    fn default() -> Self {
        Self {
            unique: Vec::new(),
            non_unique: Vec::new(),
            fields: HashSet::new(),
            unique_fetcher: None,
            non_unique_fetcher: None,
            writer: None,
            partial_writer: None,
            policy: WritePolicy::default(),
            config: None,
            error: None,
        }
    }
}

impl<T: Record> CachedRepositoryBuilder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the write policy from `config` and check the rest of it.
    ///
    /// Definitions are still registered one by one, since extractors are code.
    /// At build time each registered definition with an entry in `config` must
    /// match that entry.
    pub fn with_repository_config(mut self, config: &RepositoryConfig) -> Self {
        if let Err(e) = config.validate() {
            self.fail(e);
        }
        self.policy = config.write_policy;
        self.config = Some(config.clone());
        self
    }

    pub fn with_unique_key_cache(
        mut self,
        definition: UniqueKeyCacheDefinition<T>,
        store: Arc<dyn CacheStore>,
    ) -> Self {
        if self.register(definition.validate(), definition.key_field_name()) {
            self.unique.push((definition, store));
        }
        self
    }

    pub fn with_non_unique_key_cache(
        mut self,
        definition: NonUniqueKeyCacheDefinition<T>,
        store: Arc<dyn CacheStore>,
    ) -> Self {
        if self.register(definition.validate(), definition.key_field_name()) {
            self.non_unique.push((definition, store));
        }
        self
    }

    /// Fetcher for every unique-key cache.
    pub fn with_unique_key_data_fetcher(mut self, fetcher: Arc<dyn DataFetcher<T>>) -> Self {
        self.unique_fetcher = Some(fetcher);
        self
    }

    /// Fetcher for every non-unique-key cache. It must group matched records
    /// by the key field.
    pub fn with_non_unique_key_data_fetcher(
        mut self,
        fetcher: Arc<dyn DataFetcher<Vec<T>>>,
    ) -> Self {
        self.non_unique_fetcher = Some(fetcher);
        self
    }

    pub fn with_data_writer(mut self, writer: Arc<dyn DataWriter<T>>) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Use `writer` for every write, including `partial_update`.
    pub fn with_partial_writer<W>(mut self, writer: Arc<W>) -> Self
    where
        W: PartialDataWriter<T> + 'static,
    {
        self.writer = Some(writer.clone());
        self.partial_writer = Some(writer);
        self
    }

    pub fn with_write_policy(mut self, policy: WritePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Shorthand for `with_write_policy(WritePolicy::Evict)` when `evict`.
    pub fn evict_after_write(self, evict: bool) -> Self {
        self.with_write_policy(WritePolicy::from_evict_flag(evict))
    }

    pub fn build_read_only(self) -> DataRepoResult<ReadOnlyCachedRepository<T>> {
        if let Some(e) = self.error {
            return Err(e.into());
        }
        if let Some(config) = &self.config {
            self.check_against(config)?;
        }

        let mut caches: HashMap<String, RegisteredCache<T>> = HashMap::new();

        if !self.unique.is_empty() {
            let fetcher = self
                .unique_fetcher
                .ok_or_else(|| DataRepoError::missing_collaborator("unique key data fetcher"))?;
            for (definition, store) in self.unique {
                let cache = IndexCache::new(
                    UniqueKeyHandler::new(&definition),
                    store,
                    Arc::clone(&fetcher),
                );
                caches.insert(
                    definition.key_field_name().to_string(),
                    RegisteredCache::Unique(cache),
                );
            }
        }

        if !self.non_unique.is_empty() {
            let fetcher = self.non_unique_fetcher.ok_or_else(|| {
                DataRepoError::missing_collaborator("non-unique key data fetcher")
            })?;
            for (definition, store) in self.non_unique {
                let fetcher: Arc<dyn DataFetcher<Vec<T>>> = if definition.cache_empty_results {
                    Arc::new(EmptyResultFetcher::new(Arc::clone(&fetcher)))
                } else {
                    Arc::clone(&fetcher)
                };
                let cache = IndexCache::new(NonUniqueKeyHandler::new(&definition), store, fetcher);
                caches.insert(
                    definition.key_field_name().to_string(),
                    RegisteredCache::NonUnique(cache),
                );
            }
        }

        let repo = ReadOnlyCachedRepository::new(caches);
        debug!(fields = ?repo.fields(), "built cached repository");
        Ok(repo)
    }

    pub fn build(mut self) -> DataRepoResult<CachedRepository<T>> {
        let writer = self.writer.take();
        let partial_writer = self.partial_writer.take();
        let policy = self.policy;

        let read = self.build_read_only()?;
        let writer = writer.ok_or_else(|| DataRepoError::missing_collaborator("data writer"))?;
        Ok(CachedRepository::new(read, writer, partial_writer, policy))
    }

    /// Record a registration. Returns true if the definition should be kept.
    fn register(&mut self, validated: Result<(), ConfigError>, field: &str) -> bool {
        if let Err(e) = validated {
            self.fail(e);
            return false;
        }
        if !self.fields.insert(field.to_string()) {
            self.fail(ConfigError::DuplicateCache {
                field: field.to_string(),
            });
            return false;
        }
        true
    }

    fn fail(&mut self, error: ConfigError) {
        self.error.get_or_insert(error);
    }

    fn check_against(&self, config: &RepositoryConfig) -> Result<(), ConfigError> {
        for (definition, _) in &self.unique {
            if let Some(entry) = config.cache(definition.key_field_name()) {
                check_configured(
                    entry,
                    IndexKind::Unique,
                    &definition.key_prefix,
                    definition.expiration,
                    false,
                )?;
            }
        }
        for (definition, _) in &self.non_unique {
            if let Some(entry) = config.cache(definition.key_field_name()) {
                check_configured(
                    entry,
                    IndexKind::NonUnique,
                    &definition.key_prefix,
                    definition.expiration,
                    definition.cache_empty_results,
                )?;
            }
        }
        Ok(())
    }
}

fn check_configured(
    entry: &IndexConfig,
    kind: IndexKind,
    key_prefix: &str,
    expiration: Duration,
    cache_empty_results: bool,
) -> Result<(), ConfigError> {
    let mismatch = |setting: &str, registered: String| ConfigError::InvalidValue {
        field: format!("{}.{}", entry.field, setting),
        value: registered,
        reason: "registered definition does not match configuration".to_string(),
    };
    if entry.kind != kind {
        return Err(mismatch("kind", format!("{:?}", kind)));
    }
    if entry.key_prefix != key_prefix {
        return Err(mismatch("key_prefix", key_prefix.to_string()));
    }
    if entry.expiration() != expiration {
        return Err(mismatch("expiration_secs", expiration.as_secs().to_string()));
    }
    if entry.cache_empty_results != cache_empty_results {
        return Err(mismatch("cache_empty_results", cache_empty_results.to_string()));
    }
    Ok(())
}
