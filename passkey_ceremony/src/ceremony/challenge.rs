use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::storage::{CacheData, CacheStore, StorageError};
use crate::types::Identity;
use crate::utils::gen_random_string;

use super::errors::CeremonyError;

const CHALLENGE_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CeremonyKind {
    Registration,
    Authentication,
}

impl CeremonyKind {
    fn cache_prefix(self) -> &'static str {
        match self {
            Self::Registration => "regi_challenge",
            Self::Authentication => "auth_challenge",
        }
    }
}

/// Where a pending challenge lives. Registration and authentication
/// challenges never share a namespace, and identity-bound keys never
/// collide with opaque session ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChallengeKey {
    kind: CeremonyKind,
    subject: String,
}

impl ChallengeKey {
    pub(crate) fn registration(identity: &Identity) -> Self {
        Self {
            kind: CeremonyKind::Registration,
            subject: format!("user:{identity}"),
        }
    }

    pub(crate) fn authentication(identity: &Identity) -> Self {
        Self {
            kind: CeremonyKind::Authentication,
            subject: format!("user:{identity}"),
        }
    }

    /// Identity-less authentication, keyed by the opaque id returned in the options.
    pub(crate) fn authentication_session(auth_id: &str) -> Self {
        Self {
            kind: CeremonyKind::Authentication,
            subject: format!("session:{auth_id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StoredChallenge {
    /// Base64url challenge bytes
    pub(crate) challenge: String,
    /// User handle minted with registration options
    pub(crate) user_handle: Option<String>,
    pub(crate) issued_at: DateTime<Utc>,
    pub(crate) expires_at: DateTime<Utc>,
}

impl TryFrom<&StoredChallenge> for CacheData {
    type Error = StorageError;

    fn try_from(stored: &StoredChallenge) -> Result<Self, Self::Error> {
        Ok(Self {
            value: serde_json::to_string(stored)?,
            expires_at: stored.expires_at,
        })
    }
}

impl TryFrom<CacheData> for StoredChallenge {
    type Error = StorageError;

    fn try_from(data: CacheData) -> Result<Self, Self::Error> {
        Ok(serde_json::from_str(&data.value)?)
    }
}

/// Single-use, expiring challenges on top of a [`CacheStore`].
pub(crate) struct ChallengeStore {
    cache: Arc<dyn CacheStore>,
    ttl_secs: u64,
}

impl ChallengeStore {
    pub(crate) fn new(cache: Arc<dyn CacheStore>, ttl_secs: u64) -> Self {
        Self { cache, ttl_secs }
    }

    /// Mints a fresh challenge under `key`, replacing any pending one.
    pub(crate) async fn issue(
        &self,
        key: &ChallengeKey,
        user_handle: Option<String>,
    ) -> Result<StoredChallenge, CeremonyError> {
        let issued_at = Utc::now();
        let expires_at = i64::try_from(self.ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| issued_at.checked_add_signed(ttl))
            .ok_or_else(|| {
                CeremonyError::Config(format!("Challenge TTL out of range: {}", self.ttl_secs))
            })?;
        let stored = StoredChallenge {
            challenge: gen_random_string(CHALLENGE_LEN)?,
            user_handle,
            issued_at,
            expires_at,
        };

        let data = CacheData::try_from(&stored)?;
        self.cache
            .put_with_ttl(key.kind.cache_prefix(), &key.subject, data, self.ttl_secs as usize)
            .await?;

        tracing::debug!(kind = ?key.kind, "Issued challenge");
        Ok(stored)
    }

    /// Removes and returns the challenge under `key`. At most one caller
    /// ever receives a given challenge; expired ones come back as `None`.
    pub(crate) async fn consume(
        &self,
        key: &ChallengeKey,
    ) -> Result<Option<StoredChallenge>, CeremonyError> {
        let Some(data) = self
            .cache
            .take(key.kind.cache_prefix(), &key.subject)
            .await?
        else {
            return Ok(None);
        };

        let stored = StoredChallenge::try_from(data)?;
        if stored.expires_at <= Utc::now() {
            tracing::warn!(
                kind = ?key.kind,
                expired_at = %stored.expires_at,
                "Challenge expired before use"
            );
            return Ok(None);
        }

        Ok(Some(stored))
    }
}
