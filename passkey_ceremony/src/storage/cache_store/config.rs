use std::sync::Arc;

use crate::config::StoreConfig;
use crate::storage::errors::StorageError;

use super::types::{CacheStore, InMemoryCacheStore, RedisCacheStore};

/// Builds the challenge cache backend named by `GENERIC_CACHE_STORE_TYPE`.
pub async fn cache_store_from_config(
    config: &StoreConfig,
) -> Result<Arc<dyn CacheStore>, StorageError> {
    let store_type = config.cache_store_type.as_str();
    let store_url = config.cache_store_url.as_str();

    tracing::info!(
        "Initializing cache store with type: {}, url: {}",
        store_type,
        store_url
    );

    let store: Arc<dyn CacheStore> = match store_type {
        "memory" => Arc::new(InMemoryCacheStore::new()),
        "redis" => Arc::new(RedisCacheStore::connect(store_url)?),
        t => {
            return Err(StorageError::Storage(format!(
                "Unsupported cache store type: {t}. Supported types are 'memory' and 'redis'"
            )));
        }
    };

    store.init().await.inspect_err(|e| {
        tracing::error!("Failed to initialize cache store: {}", e);
    })?;

    tracing::info!(
        "Connected to cache store: type={}, url={}",
        store_type,
        store_url
    );

    Ok(store)
}
