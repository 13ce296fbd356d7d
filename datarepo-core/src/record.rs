//! Record capabilities.
//!
//! The engine is generic over the record type `T`. Everything it needs to do
//! with a record (clone it into a cache group, serialize it for a store, read
//! an index field) is expressed here as trait bounds and typed extractors
//! rather than runtime field lookup.

use std::fmt;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use crate::KeyValue;

/// Marker trait for types that can be served by a cached repository.
///
/// Blanket-implemented for every type with the required bounds:
/// - `Clone` so non-unique groups can be rebuilt on update
/// - `Serialize` + `DeserializeOwned` for cache store payloads
/// - `Send + Sync + 'static` for async compatibility
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Record for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// A named, typed accessor for one field of `T`.
///
/// The name is a label used for dispatch and diagnostics only; the value is
/// always read through the closure.
pub struct KeyExtractor<T> {
    field: String,
    extract: Arc<dyn Fn(&T) -> KeyValue + Send + Sync>,
}

impl<T> KeyExtractor<T> {
    pub fn new<F, K>(field: impl Into<String>, extract: F) -> Self
    where
        F: Fn(&T) -> K + Send + Sync + 'static,
        K: Into<KeyValue>,
    {
        Self {
            field: field.into(),
            extract: Arc::new(move |value| extract(value).into()),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn extract(&self, value: &T) -> KeyValue {
        (self.extract)(value)
    }
}

impl<T> Clone for KeyExtractor<T> {
    fn clone(&self) -> Self {
        Self {
            field: self.field.clone(),
            extract: Arc::clone(&self.extract),
        }
    }
}

impl<T> fmt::Debug for KeyExtractor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyExtractor")
            .field("field", &self.field)
            .finish_non_exhaustive()
    }
}
