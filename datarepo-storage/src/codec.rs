//! Payload encoding for cache stores.
//!
//! Records and record groups are stored as JSON. Codec failures carry the
//! cache key so a corrupt entry can be found and deleted.

use datarepo_core::{DataRepoResult, StoreError};
use serde::{de::DeserializeOwned, Serialize};

pub fn encode<V: Serialize>(key: &str, value: &V) -> DataRepoResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| {
        StoreError::Codec {
            key: key.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

pub fn decode<V: DeserializeOwned>(key: &str, bytes: &[u8]) -> DataRepoResult<V> {
    serde_json::from_slice(bytes).map_err(|e| {
        StoreError::Codec {
            key: key.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}
