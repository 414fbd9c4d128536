mod cache_store;
mod credential_store;
mod errors;
mod types;

pub use cache_store::{CacheStore, InMemoryCacheStore, RedisCacheStore, cache_store_from_config};
pub use credential_store::{
    CredentialStore, InMemoryCredentialStore, SqliteCredentialStore, credential_store_from_config,
};
pub use errors::StorageError;
pub use types::CacheData;
