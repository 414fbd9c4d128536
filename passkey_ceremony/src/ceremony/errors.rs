use thiserror::Error;

use crate::config::ConfigError;
use crate::storage::StorageError;
use crate::utils::UtilError;

/// Errors returned by the ceremony engine.
///
/// Verification-time failures such as a bad signature, a wrong origin or a
/// replayed challenge collapse into a few kinds that the HTTP layer renders
/// with one generic message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CeremonyError {
    /// Malformed or missing input
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Registration options requested for an identity that already exists
    #[error("User already exists")]
    IdentityAlreadyRegistered,

    /// The credential or identity is not known to the store
    #[error("Unknown credential")]
    UnknownCredential,

    /// The new credential id is already registered anywhere in the store
    #[error("Credential already registered")]
    CredentialIdCollision,

    /// No live challenge for this ceremony; it expired, was used, or never existed
    #[error("Invalid or expired challenge")]
    InvalidOrExpiredChallenge,

    /// Verifier rejected the response, or the user handle did not match
    #[error("Verification failed")]
    VerificationFailed,

    /// The signature counter went backwards or stood still
    #[error("Possible cloned authenticator (stored counter: {stored}, received: {received})")]
    PossibleClonedAuthenticator { stored: u32, received: u32 },

    /// Challenge or credential store unreachable
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The verifier did not answer within the configured time
    #[error("Verifier timed out")]
    VerifierTimeout,

    #[error("Token error: {0}")]
    Token(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CeremonyError {
    /// Whether retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::VerifierTimeout)
    }

    /// Log the error and return self
    ///
    /// Client mistakes and security rejections are logged at `warn`,
    /// infrastructure faults at `error`.
    pub fn log(self) -> Self {
        match &self {
            Self::InvalidRequest(msg) => tracing::warn!("Invalid request: {}", msg),
            Self::IdentityAlreadyRegistered => tracing::warn!("User already exists"),
            Self::UnknownCredential => tracing::warn!("Unknown credential"),
            Self::CredentialIdCollision => tracing::warn!("Credential already registered"),
            Self::InvalidOrExpiredChallenge => tracing::warn!("Invalid or expired challenge"),
            Self::VerificationFailed => tracing::warn!("Verification failed"),
            Self::PossibleClonedAuthenticator { stored, received } => tracing::warn!(
                security_event = "possible_cloned_authenticator",
                stored,
                received,
                "Possible cloned authenticator: signature counter did not increase"
            ),
            Self::StoreUnavailable(msg) => tracing::error!("Store unavailable: {}", msg),
            Self::VerifierTimeout => tracing::error!("Verifier timed out"),
            Self::Token(msg) => tracing::error!("Token error: {}", msg),
            Self::Config(msg) => tracing::error!("Configuration error: {}", msg),
            Self::Internal(msg) => tracing::error!("Internal error: {}", msg),
        }
        self
    }
}

impl From<StorageError> for CeremonyError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::IdentityExists(_) => Self::IdentityAlreadyRegistered,
            StorageError::CredentialIdExists(_) => Self::CredentialIdCollision,
            StorageError::NotFound(_) => Self::UnknownCredential,
            StorageError::CounterNotIncreased { stored, received } => {
                Self::PossibleClonedAuthenticator { stored, received }
            }
            StorageError::Storage(msg) | StorageError::Serde(msg) => {
                let error = Self::StoreUnavailable(msg);
                tracing::error!("{}", error);
                error
            }
        }
    }
}

impl From<UtilError> for CeremonyError {
    fn from(err: UtilError) -> Self {
        let error = Self::Internal(err.to_string());
        tracing::error!("{}", error);
        error
    }
}

impl From<ConfigError> for CeremonyError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
