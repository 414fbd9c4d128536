mod config;
mod memory;
mod redis;
mod types;

pub use config::cache_store_from_config;
pub use types::{CacheStore, InMemoryCacheStore, RedisCacheStore};
