use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, Sqlite, Transaction};
use std::str::FromStr;

use crate::storage::errors::StorageError;
use crate::types::{Authenticator, CredentialId, Identity, User};

use super::types::{CredentialStore, SqliteCredentialStore};

const DB_TABLE_USERS: &str = "passkey_users";
const DB_TABLE_AUTHENTICATORS: &str = "passkey_authenticators";

#[derive(FromRow)]
struct UserRow {
    identity: String,
    user_handle: String,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct AuthenticatorRow {
    credential_id: String,
    identity: String,
    public_key: Vec<u8>,
    sign_count: i64,
    transports: String,
    created_at: DateTime<Utc>,
}

impl AuthenticatorRow {
    fn into_authenticator(self) -> Result<(Identity, Authenticator), StorageError> {
        let identity = Identity::parse(&self.identity)
            .map_err(|e| StorageError::Serde(format!("Stored identity is invalid: {e}")))?;
        let credential_id = CredentialId::from_base64url(&self.credential_id)
            .map_err(|e| StorageError::Serde(format!("Stored credential id is invalid: {e}")))?;
        let sign_count = u32::try_from(self.sign_count)
            .map_err(|_| StorageError::Serde(format!("Sign count out of range: {}", self.sign_count)))?;
        let transports: Vec<String> = serde_json::from_str(&self.transports)?;

        Ok((
            identity,
            Authenticator {
                credential_id,
                public_key: self.public_key,
                sign_count,
                transports,
                created_at: self.created_at,
            },
        ))
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

impl SqliteCredentialStore {
    /// Opens (creating if missing) the database at `url`. In-memory databases
    /// are pinned to a single connection so every query sees the same data.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let opts = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        Ok(Self { pool })
    }

    async fn insert_user(
        tx: &mut Transaction<'_, Sqlite>,
        identity: &Identity,
        user_handle: &str,
    ) -> Result<(), StorageError> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {DB_TABLE_USERS} (identity, user_handle, created_at)
            VALUES (?, ?, ?)
            "#
        ))
        .bind(identity.as_str())
        .bind(user_handle)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StorageError::IdentityExists(identity.to_string())
            } else {
                StorageError::from(e)
            }
        })?;
        Ok(())
    }

    async fn insert_authenticator(
        tx: &mut Transaction<'_, Sqlite>,
        identity: &Identity,
        authenticator: &Authenticator,
    ) -> Result<(), StorageError> {
        let transports = serde_json::to_string(&authenticator.transports)?;

        sqlx::query(&format!(
            r#"
            INSERT INTO {DB_TABLE_AUTHENTICATORS}
            (credential_id, identity, public_key, sign_count, transports, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#
        ))
        .bind(authenticator.credential_id.to_base64url())
        .bind(identity.as_str())
        .bind(&authenticator.public_key)
        .bind(i64::from(authenticator.sign_count))
        .bind(transports)
        .bind(authenticator.created_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StorageError::CredentialIdExists(authenticator.credential_id.to_string())
            } else {
                StorageError::from(e)
            }
        })?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn init(&self) -> Result<(), StorageError> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {DB_TABLE_USERS} (
                identity TEXT PRIMARY KEY NOT NULL,
                user_handle TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL
            )
            "#
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {DB_TABLE_AUTHENTICATORS} (
                credential_id TEXT PRIMARY KEY NOT NULL,
                identity TEXT NOT NULL REFERENCES {DB_TABLE_USERS}(identity),
                public_key BLOB NOT NULL,
                sign_count INTEGER NOT NULL DEFAULT 0,
                transports TEXT NOT NULL DEFAULT '[]',
                created_at TIMESTAMP NOT NULL
            )
            "#
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{DB_TABLE_AUTHENTICATORS}_identity ON {DB_TABLE_AUTHENTICATORS}(identity)"
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_user(&self, identity: &Identity) -> Result<Option<User>, StorageError> {
        // User row and authenticators are read from the same snapshot.
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT identity, user_handle, created_at FROM {DB_TABLE_USERS} WHERE identity = ?"
        ))
        .bind(identity.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };

        let authenticators = sqlx::query_as::<_, AuthenticatorRow>(&format!(
            r#"
            SELECT credential_id, identity, public_key, sign_count, transports, created_at
            FROM {DB_TABLE_AUTHENTICATORS} WHERE identity = ? ORDER BY created_at
            "#
        ))
        .bind(identity.as_str())
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|r| r.into_authenticator().map(|(_, a)| a))
        .collect::<Result<Vec<_>, _>>()?;
        tx.commit().await?;

        Ok(Some(User {
            identity: Identity::parse(&row.identity)
                .map_err(|e| StorageError::Serde(format!("Stored identity is invalid: {e}")))?,
            user_handle: row.user_handle,
            authenticators,
            created_at: row.created_at,
        }))
    }

    async fn add_user(&self, identity: &Identity, user_handle: &str) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        Self::insert_user(&mut tx, identity, user_handle).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn add_authenticator(
        &self,
        identity: &Identity,
        authenticator: Authenticator,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<(String,)> = sqlx::query_as(&format!(
            "SELECT identity FROM {DB_TABLE_USERS} WHERE identity = ?"
        ))
        .bind(identity.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        if exists.is_none() {
            return Err(StorageError::NotFound(identity.to_string()));
        }

        Self::insert_authenticator(&mut tx, identity, &authenticator).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn create_user_with_authenticator(
        &self,
        identity: &Identity,
        user_handle: &str,
        authenticator: Authenticator,
    ) -> Result<(), StorageError> {
        // Dropping the transaction on an early return rolls back the user row
        let mut tx = self.pool.begin().await?;
        Self::insert_user(&mut tx, identity, user_handle).await?;
        Self::insert_authenticator(&mut tx, identity, &authenticator).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn find_authenticator_by_credential_id(
        &self,
        credential_id: &CredentialId,
    ) -> Result<Option<(Identity, Authenticator)>, StorageError> {
        sqlx::query_as::<_, AuthenticatorRow>(&format!(
            r#"
            SELECT credential_id, identity, public_key, sign_count, transports, created_at
            FROM {DB_TABLE_AUTHENTICATORS} WHERE credential_id = ?
            "#
        ))
        .bind(credential_id.to_base64url())
        .fetch_optional(&self.pool)
        .await?
        .map(AuthenticatorRow::into_authenticator)
        .transpose()
    }

    async fn update_sign_count(
        &self,
        credential_id: &CredentialId,
        new_count: u32,
    ) -> Result<(), StorageError> {
        let key = credential_id.to_base64url();
        let new_count = i64::from(new_count);

        // The WHERE guard makes the compare-and-set a single statement
        let result = sqlx::query(&format!(
            r#"
            UPDATE {DB_TABLE_AUTHENTICATORS}
            SET sign_count = ?
            WHERE credential_id = ? AND sign_count < ?
            "#
        ))
        .bind(new_count)
        .bind(&key)
        .bind(new_count)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let stored: Option<(i64,)> = sqlx::query_as(&format!(
            "SELECT sign_count FROM {DB_TABLE_AUTHENTICATORS} WHERE credential_id = ?"
        ))
        .bind(&key)
        .fetch_optional(&self.pool)
        .await?;

        match stored {
            Some((stored,)) => Err(StorageError::CounterNotIncreased {
                stored: u32::try_from(stored).unwrap_or(u32::MAX),
                received: u32::try_from(new_count).unwrap_or(u32::MAX),
            }),
            None => Err(StorageError::NotFound(credential_id.to_string())),
        }
    }
}
