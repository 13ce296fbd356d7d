//! Configuration types

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::ConfigError;

/// What a cached repository does to its caches after a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Delete the entry derived from the written value in every cache.
    Evict,
    /// Write the value into every cache.
    #[default]
    Update,
}

impl WritePolicy {
    /// Map the builder-style "evict after write" flag to a policy.
    pub fn from_evict_flag(evict: bool) -> Self {
        if evict {
            Self::Evict
        } else {
            Self::Update
        }
    }
}

/// Kind of index a configured cache backs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Unique,
    NonUnique,
}

/// Declarative settings for one cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Field name the index is registered under.
    pub field: String,
    pub key_prefix: String,
    /// Entry lifetime; `0` keeps entries until they are evicted.
    pub expiration_secs: u64,
    pub kind: IndexKind,
    #[serde(default)]
    pub cache_empty_results: bool,
}

impl IndexConfig {
    pub fn expiration(&self) -> Duration {
        Duration::from_secs(self.expiration_secs)
    }
}

/// Declarative repository settings, usually loaded from TOML.
///
/// Extractors are code and are never part of the file; they are paired with
/// these entries when definitions are built.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default)]
    pub write_policy: WritePolicy,
    #[serde(default)]
    pub caches: Vec<IndexConfig>,
}

impl RepositoryConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input).map_err(|e| ConfigError::InvalidValue {
            field: "repository".to_string(),
            value: "<toml>".to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for cache in &self.caches {
            if cache.field.trim().is_empty() {
                return Err(ConfigError::EmptyFieldName {
                    field: "field".to_string(),
                });
            }
            if !seen.insert(cache.field.as_str()) {
                return Err(ConfigError::DuplicateCache {
                    field: cache.field.clone(),
                });
            }
        }
        Ok(())
    }

    /// Look up the entry for a field.
    pub fn cache(&self, field: &str) -> Option<&IndexConfig> {
        self.caches.iter().find(|c| c.field == field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
write_policy = "evict"

[[caches]]
field = "id"
key_prefix = "b:"
expiration_secs = 300
kind = "unique"

[[caches]]
field = "author_id"
key_prefix = "a:"
expiration_secs = 600
kind = "non_unique"
cache_empty_results = true
"#;

    #[test]
    fn test_parse_sample() {
        let config = RepositoryConfig::from_toml_str(SAMPLE).expect("sample should parse");
        assert_eq!(config.write_policy, WritePolicy::Evict);
        assert_eq!(config.caches.len(), 2);

        let author = config.cache("author_id").expect("author_id configured");
        assert_eq!(author.kind, IndexKind::NonUnique);
        assert!(author.cache_empty_results);
        assert_eq!(author.expiration(), Duration::from_secs(600));

        let id = config.cache("id").expect("id configured");
        assert!(!id.cache_empty_results);
    }

    #[test]
    fn test_defaults() {
        let config = RepositoryConfig::from_toml_str("").expect("empty config is valid");
        assert_eq!(config.write_policy, WritePolicy::Update);
        assert!(config.caches.is_empty());
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let input = r#"
[[caches]]
field = "id"
key_prefix = "b:"
expiration_secs = 1
kind = "unique"

[[caches]]
field = "id"
key_prefix = "c:"
expiration_secs = 1
kind = "non_unique"
"#;
        assert_eq!(
            RepositoryConfig::from_toml_str(input),
            Err(ConfigError::DuplicateCache {
                field: "id".to_string()
            })
        );
    }

    #[test]
    fn test_zero_expiration_means_no_expiry() {
        let config = RepositoryConfig {
            write_policy: WritePolicy::Update,
            caches: vec![IndexConfig {
                field: "id".to_string(),
                key_prefix: "b:".to_string(),
                expiration_secs: 0,
                kind: IndexKind::Unique,
                cache_empty_results: false,
            }],
        };
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.caches[0].expiration(), Duration::ZERO);
    }

    #[test]
    fn test_blank_field_rejected() {
        let input = r#"
[[caches]]
field = " "
key_prefix = "b:"
expiration_secs = 1
kind = "unique"
"#;
        assert_eq!(
            RepositoryConfig::from_toml_str(input),
            Err(ConfigError::EmptyFieldName {
                field: "field".to_string()
            })
        );
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = RepositoryConfig::from_toml_str("write_policy = 12").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_policy_from_flag() {
        assert_eq!(WritePolicy::from_evict_flag(true), WritePolicy::Evict);
        assert_eq!(WritePolicy::from_evict_flag(false), WritePolicy::Update);
    }
}
