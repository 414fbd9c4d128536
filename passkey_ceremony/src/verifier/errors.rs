use thiserror::Error;

use crate::utils::UtilError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifierError {
    /// Malformed client data JSON or a type, challenge or origin mismatch
    #[error("Client data error: {0}")]
    ClientData(String),

    /// Truncated authenticator data or an rpIdHash / flag check failure
    #[error("Authenticator data error: {0}")]
    AuthenticatorData(String),

    #[error("Attestation error: {0}")]
    Attestation(String),

    #[error("Invalid public key: {0}")]
    PublicKey(String),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(i64),

    #[error("Signature error: {0}")]
    Signature(String),

    #[error("Invalid format: {0}")]
    Format(String),
}

impl From<UtilError> for VerifierError {
    fn from(err: UtilError) -> Self {
        Self::Format(err.to_string())
    }
}
