use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::storage::errors::StorageError;
use crate::storage::types::CacheData;

pub struct InMemoryCacheStore {
    pub(super) entry: Mutex<HashMap<String, CacheData>>,
}

pub struct RedisCacheStore {
    pub(super) client: redis::Client,
}

/// Short-lived key/value storage with per-entry expiry.
///
/// Implementations must make [`take`](CacheStore::take) atomic: when several
/// callers race on the same key, at most one of them receives the value.
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// Initialize the store. This is called when the store is created.
    async fn init(&self) -> Result<(), StorageError>;

    /// Put a value into the store with a TTL in seconds, replacing any
    /// existing value under the same key.
    async fn put_with_ttl(
        &self,
        prefix: &str,
        key: &str,
        value: CacheData,
        ttl: usize,
    ) -> Result<(), StorageError>;

    /// Atomically fetch and delete a value. Expired values are reported as
    /// absent.
    async fn take(&self, prefix: &str, key: &str) -> Result<Option<CacheData>, StorageError>;
}
