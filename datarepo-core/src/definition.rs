//! Cache definitions.
//!
//! A definition describes one logical index over `T`: how to namespace its
//! cache keys, which field acts as the key, and how long entries live. Once a
//! cache is built from a definition it is never mutated.

use std::time::Duration;

use crate::config::{IndexConfig, IndexKind};
use crate::{ConfigError, KeyExtractor};

/// Index where each key maps to at most one record (e.g. a primary key).
#[derive(Debug, Clone)]
pub struct UniqueKeyCacheDefinition<T> {
    /// Prepended to every cache key of this index.
    pub key_prefix: String,
    /// Field acting as the index key.
    pub key: KeyExtractor<T>,
    /// Time-to-live of cache entries.
    pub expiration: Duration,
}

impl<T> UniqueKeyCacheDefinition<T> {
    pub fn new(key_prefix: impl Into<String>, key: KeyExtractor<T>, expiration: Duration) -> Self {
        Self {
            key_prefix: key_prefix.into(),
            key,
            expiration,
        }
    }

    /// Build from a declarative index entry plus the typed key extractor.
    pub fn from_config(config: &IndexConfig, key: KeyExtractor<T>) -> Result<Self, ConfigError> {
        if config.kind != IndexKind::Unique {
            return Err(ConfigError::InvalidValue {
                field: config.field.clone(),
                value: format!("{:?}", config.kind),
                reason: "expected a unique index".to_string(),
            });
        }
        check_label(&config.field, &key)?;
        Ok(Self::new(config.key_prefix.clone(), key, config.expiration()))
    }

    pub fn key_field_name(&self) -> &str {
        self.key.field()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_field_name("key_field_name", self.key.field())
    }
}

/// Index where each key maps to a group of records (e.g. a foreign key).
///
/// Records inside one group are told apart by `sub_key`.
#[derive(Debug, Clone)]
pub struct NonUniqueKeyCacheDefinition<T> {
    /// Prepended to every cache key of this index.
    pub key_prefix: String,
    /// Field acting as the index key.
    pub key: KeyExtractor<T>,
    /// Field identifying a record within its group.
    pub sub_key: KeyExtractor<T>,
    /// Time-to-live of cache entries.
    pub expiration: Duration,
    /// Cache "no records for this key" as an explicit empty group.
    pub cache_empty_results: bool,
}

impl<T> NonUniqueKeyCacheDefinition<T> {
    pub fn new(
        key_prefix: impl Into<String>,
        key: KeyExtractor<T>,
        sub_key: KeyExtractor<T>,
        expiration: Duration,
    ) -> Self {
        Self {
            key_prefix: key_prefix.into(),
            key,
            sub_key,
            expiration,
            cache_empty_results: false,
        }
    }

    pub fn with_empty_results(mut self, enabled: bool) -> Self {
        self.cache_empty_results = enabled;
        self
    }

    /// Build from a declarative index entry plus the typed extractors.
    pub fn from_config(
        config: &IndexConfig,
        key: KeyExtractor<T>,
        sub_key: KeyExtractor<T>,
    ) -> Result<Self, ConfigError> {
        if config.kind != IndexKind::NonUnique {
            return Err(ConfigError::InvalidValue {
                field: config.field.clone(),
                value: format!("{:?}", config.kind),
                reason: "expected a non-unique index".to_string(),
            });
        }
        check_label(&config.field, &key)?;
        Ok(
            Self::new(config.key_prefix.clone(), key, sub_key, config.expiration())
                .with_empty_results(config.cache_empty_results),
        )
    }

    pub fn key_field_name(&self) -> &str {
        self.key.field()
    }

    pub fn sub_key_field_name(&self) -> &str {
        self.sub_key.field()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_field_name("key_field_name", self.key.field())?;
        require_field_name("sub_key_field_name", self.sub_key.field())
    }
}

fn require_field_name(which: &str, name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::EmptyFieldName {
            field: which.to_string(),
        });
    }
    Ok(())
}

fn check_label<T>(configured: &str, key: &KeyExtractor<T>) -> Result<(), ConfigError> {
    if configured != key.field() {
        return Err(ConfigError::InvalidValue {
            field: configured.to_string(),
            value: key.field().to_string(),
            reason: "extractor label does not match configured field".to_string(),
        });
    }
    Ok(())
}
