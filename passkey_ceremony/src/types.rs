use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::ceremony::CeremonyError;
use crate::utils::{UtilError, base64url_decode, base64url_encode};

const MAX_IDENTITY_LEN: usize = 255;

/// Application-level user identifier (an email address in the reference
/// deployment). Parsing trims surrounding whitespace and rejects empty,
/// over-long, or control-character-bearing values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    pub fn parse(raw: &str) -> Result<Self, CeremonyError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CeremonyError::InvalidRequest(
                "Identity must not be empty".to_string(),
            ));
        }
        if trimmed.chars().count() > MAX_IDENTITY_LEN {
            return Err(CeremonyError::InvalidRequest(format!(
                "Identity must be at most {MAX_IDENTITY_LEN} characters"
            )));
        }
        if trimmed.chars().any(char::is_control) {
            return Err(CeremonyError::InvalidRequest(
                "Identity contains control characters".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identity {
    type Error = CeremonyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw credential id bytes. Rendered and parsed as unpadded base64url
/// everywhere it crosses a text boundary (JSON, logs, SQL keys).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CredentialId(Vec<u8>);

impl CredentialId {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn from_base64url(encoded: &str) -> Result<Self, UtilError> {
        let bytes = base64url_decode(encoded)?;
        if bytes.is_empty() {
            return Err(UtilError::Format("Empty credential id".to_string()));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64url(&self) -> String {
        base64url_encode(&self.0)
    }
}

impl fmt::Debug for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CredentialId({})", self.to_base64url())
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64url())
    }
}

impl Serialize for CredentialId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64url())
    }
}

impl<'de> Deserialize<'de> for CredentialId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::from_base64url(&encoded).map_err(serde::de::Error::custom)
    }
}

/// A registered credential as persisted by a [`CredentialStore`](crate::CredentialStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authenticator {
    pub credential_id: CredentialId,
    /// COSE_Key bytes exactly as the authenticator produced them.
    pub public_key: Vec<u8>,
    pub sign_count: u32,
    pub transports: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A user together with every authenticator registered to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub identity: Identity,
    /// Base64url WebAuthn user handle, minted once at registration.
    pub user_handle: String,
    pub authenticators: Vec<Authenticator>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn authenticator(&self, credential_id: &CredentialId) -> Option<&Authenticator> {
        self.authenticators
            .iter()
            .find(|a| &a.credential_id == credential_id)
    }
}
