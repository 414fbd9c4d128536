use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Backend unreachable or failed mid-operation
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Json conversion(Serde) error: {0}")]
    Serde(String),

    #[error("Identity already exists: {0}")]
    IdentityExists(String),

    /// The credential id is already registered, to this or any other identity
    #[error("Credential id already exists: {0}")]
    CredentialIdExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Sign counter did not increase (stored: {stored}, received: {received})")]
    CounterNotIncreased { stored: u32, received: u32 },
}

impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err.to_string())
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
