mod config;
mod memory;
mod sqlite;
mod types;

pub use config::credential_store_from_config;
pub use types::{CredentialStore, InMemoryCredentialStore, SqliteCredentialStore};
