use std::sync::Arc;

use crate::config::StoreConfig;
use crate::storage::errors::StorageError;

use super::types::{CredentialStore, InMemoryCredentialStore, SqliteCredentialStore};

/// Builds the credential backend named by `GENERIC_DATA_STORE_TYPE` and
/// creates its tables.
pub async fn credential_store_from_config(
    config: &StoreConfig,
) -> Result<Arc<dyn CredentialStore>, StorageError> {
    let store_type = config.data_store_type.as_str();
    let store_url = config.data_store_url.as_str();

    tracing::info!(
        "Initializing data store with type: {}, url: {}",
        store_type,
        store_url
    );

    let store: Arc<dyn CredentialStore> = match store_type {
        "memory" => Arc::new(InMemoryCredentialStore::new()),
        "sqlite" => Arc::new(SqliteCredentialStore::connect(store_url).await?),
        t => {
            return Err(StorageError::Storage(format!(
                "Unsupported data store type: {t}. Supported types are 'memory' and 'sqlite'"
            )));
        }
    };

    store.init().await.inspect_err(|e| {
        tracing::error!("Failed to initialize data store: {}", e);
    })?;

    tracing::info!(
        "Connected to database: type={}, url={}",
        store_type,
        store_url
    );

    Ok(store)
}
