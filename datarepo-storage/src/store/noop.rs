//! A cache store that stores nothing.

use std::time::Duration;

use async_trait::async_trait;
use datarepo_core::{DataRepoResult, RequestContext};

use super::traits::CacheStore;

/// Every read misses and every write is dropped, so a repository wired with
/// this store always reads through to its data fetcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCacheStore;

#[async_trait]
impl CacheStore for NoCacheStore {
    async fn get(&self, _ctx: &RequestContext, _key: &str) -> DataRepoResult<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn get_multi(
        &self,
        _ctx: &RequestContext,
        keys: &[String],
    ) -> DataRepoResult<Vec<Option<Vec<u8>>>> {
        Ok(vec![None; keys.len()])
    }

    async fn set(
        &self,
        _ctx: &RequestContext,
        _key: &str,
        _value: Vec<u8>,
        _ttl: Duration,
    ) -> DataRepoResult<()> {
        Ok(())
    }

    async fn delete(&self, _ctx: &RequestContext, _key: &str) -> DataRepoResult<()> {
        Ok(())
    }
}
