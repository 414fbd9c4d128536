use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::storage::errors::StorageError;
use crate::types::{Authenticator, CredentialId, Identity, User};

use super::types::{CredentialStore, InMemoryCredentialStore, InMemoryState};

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        tracing::info!("Creating new in-memory credential store");
        Self {
            state: Mutex::new(InMemoryState::default()),
        }
    }
}

impl Default for InMemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryState {
    fn check_credential_free(&self, credential_id: &CredentialId) -> Result<(), StorageError> {
        if self.owners.contains_key(credential_id) {
            return Err(StorageError::CredentialIdExists(credential_id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn init(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn get_user(&self, identity: &Identity) -> Result<Option<User>, StorageError> {
        Ok(self.state.lock().await.users.get(identity).cloned())
    }

    async fn add_user(&self, identity: &Identity, user_handle: &str) -> Result<(), StorageError> {
        let mut state = self.state.lock().await;
        if state.users.contains_key(identity) {
            return Err(StorageError::IdentityExists(identity.to_string()));
        }
        state.users.insert(
            identity.clone(),
            User {
                identity: identity.clone(),
                user_handle: user_handle.to_string(),
                authenticators: Vec::new(),
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn add_authenticator(
        &self,
        identity: &Identity,
        authenticator: Authenticator,
    ) -> Result<(), StorageError> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(identity) {
            return Err(StorageError::NotFound(identity.to_string()));
        }
        state.check_credential_free(&authenticator.credential_id)?;

        state
            .owners
            .insert(authenticator.credential_id.clone(), identity.clone());
        if let Some(user) = state.users.get_mut(identity) {
            user.authenticators.push(authenticator);
        }
        Ok(())
    }

    async fn create_user_with_authenticator(
        &self,
        identity: &Identity,
        user_handle: &str,
        authenticator: Authenticator,
    ) -> Result<(), StorageError> {
        let mut state = self.state.lock().await;
        if state.users.contains_key(identity) {
            return Err(StorageError::IdentityExists(identity.to_string()));
        }
        state.check_credential_free(&authenticator.credential_id)?;

        state
            .owners
            .insert(authenticator.credential_id.clone(), identity.clone());
        state.users.insert(
            identity.clone(),
            User {
                identity: identity.clone(),
                user_handle: user_handle.to_string(),
                authenticators: vec![authenticator],
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn find_authenticator_by_credential_id(
        &self,
        credential_id: &CredentialId,
    ) -> Result<Option<(Identity, Authenticator)>, StorageError> {
        let state = self.state.lock().await;
        let found = state.owners.get(credential_id).and_then(|identity| {
            state
                .users
                .get(identity)
                .and_then(|user| user.authenticator(credential_id))
                .map(|authenticator| (identity.clone(), authenticator.clone()))
        });
        Ok(found)
    }

    async fn update_sign_count(
        &self,
        credential_id: &CredentialId,
        new_count: u32,
    ) -> Result<(), StorageError> {
        let mut state = self.state.lock().await;
        let identity = state
            .owners
            .get(credential_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(credential_id.to_string()))?;

        let authenticator = state
            .users
            .get_mut(&identity)
            .and_then(|user| {
                user.authenticators
                    .iter_mut()
                    .find(|a| &a.credential_id == credential_id)
            })
            .ok_or_else(|| StorageError::NotFound(credential_id.to_string()))?;

        if new_count <= authenticator.sign_count {
            return Err(StorageError::CounterNotIncreased {
                stored: authenticator.sign_count,
                received: new_count,
            });
        }
        authenticator.sign_count = new_count;
        Ok(())
    }
}
