use async_trait::async_trait;
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::storage::errors::StorageError;
use crate::types::{Authenticator, CredentialId, Identity, User};

#[derive(Default)]
pub(super) struct InMemoryState {
    pub(super) users: HashMap<Identity, User>,
    /// Global credential id index; a credential id maps to exactly one identity
    pub(super) owners: HashMap<CredentialId, Identity>,
}

pub struct InMemoryCredentialStore {
    pub(super) state: Mutex<InMemoryState>,
}

pub struct SqliteCredentialStore {
    pub(super) pool: Pool<Sqlite>,
}

/// Persistent storage for users and their authenticators.
///
/// Credential ids are unique across the whole store, not just per user.
/// [`update_sign_count`](CredentialStore::update_sign_count) must be
/// linearizable per credential id: of two racing updates with the same
/// counter value, exactly one succeeds.
#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    /// Create tables or other backing structures. Safe to call repeatedly.
    async fn init(&self) -> Result<(), StorageError>;

    async fn get_user(&self, identity: &Identity) -> Result<Option<User>, StorageError>;

    /// Fails with [`StorageError::IdentityExists`] if the identity is taken.
    async fn add_user(&self, identity: &Identity, user_handle: &str) -> Result<(), StorageError>;

    /// Fails with [`StorageError::NotFound`] for an unknown identity and
    /// [`StorageError::CredentialIdExists`] if the credential id is
    /// registered anywhere in the store.
    async fn add_authenticator(
        &self,
        identity: &Identity,
        authenticator: Authenticator,
    ) -> Result<(), StorageError>;

    /// Creates the user and its first authenticator as one unit. On any
    /// failure nothing is written.
    async fn create_user_with_authenticator(
        &self,
        identity: &Identity,
        user_handle: &str,
        authenticator: Authenticator,
    ) -> Result<(), StorageError>;

    async fn find_authenticator_by_credential_id(
        &self,
        credential_id: &CredentialId,
    ) -> Result<Option<(Identity, Authenticator)>, StorageError>;

    /// Stores `new_count` only if it is strictly greater than the stored
    /// value, otherwise fails with [`StorageError::CounterNotIncreased`].
    async fn update_sign_count(
        &self,
        credential_id: &CredentialId,
        new_count: u32,
    ) -> Result<(), StorageError>;
}
