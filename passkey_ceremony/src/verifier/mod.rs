//! Cryptographic verification of WebAuthn responses.
//!
//! The ceremony engine only talks to the [`CredentialVerifier`] trait, so a
//! deployment can swap [`NativeVerifier`] for another implementation (or a
//! scripted one in tests) without touching ceremony logic.

mod attestation;
mod authenticator_data;
mod client_data;
mod cose;
mod errors;
mod native;

use async_trait::async_trait;

use crate::ceremony::{AuthenticationCredential, RegistrationCredential};
use crate::types::{Authenticator, CredentialId};

pub use errors::VerifierError;
pub use native::NativeVerifier;

pub struct RegistrationVerificationRequest<'a> {
    pub response: &'a RegistrationCredential,
    pub expected_challenge: &'a str,
    pub expected_origins: &'a [String],
    pub expected_rp_id: &'a str,
    pub require_user_verification: bool,
}

#[derive(Debug, Clone)]
pub struct VerifiedRegistration {
    pub verified: bool,
    pub registration_info: Option<RegistrationInfo>,
}

#[derive(Debug, Clone)]
pub struct RegistrationInfo {
    pub credential_id: CredentialId,
    /// COSE_Key bytes of the new credential
    pub public_key: Vec<u8>,
    pub sign_count: u32,
    pub aaguid: String,
    pub user_verified: bool,
}

pub struct AuthenticationVerificationRequest<'a> {
    pub response: &'a AuthenticationCredential,
    pub expected_challenge: &'a str,
    pub expected_origins: &'a [String],
    pub expected_rp_id: &'a str,
    pub authenticator: &'a Authenticator,
    pub require_user_verification: bool,
}

#[derive(Debug, Clone)]
pub struct VerifiedAuthentication {
    pub verified: bool,
    pub authentication_info: Option<AuthenticationInfo>,
}

#[derive(Debug, Clone)]
pub struct AuthenticationInfo {
    pub credential_id: CredentialId,
    pub new_counter: u32,
    pub user_verified: bool,
    pub backed_up: bool,
}

/// Verifies attestation and assertion responses against the expected
/// challenge, origins and relying party id.
///
/// Returning `Ok` with `verified == false` and returning `Err` are treated
/// the same way by the ceremony engine.
#[async_trait]
pub trait CredentialVerifier: Send + Sync + 'static {
    async fn verify_registration(
        &self,
        request: RegistrationVerificationRequest<'_>,
    ) -> Result<VerifiedRegistration, VerifierError>;

    async fn verify_authentication(
        &self,
        request: AuthenticationVerificationRequest<'_>,
    ) -> Result<VerifiedAuthentication, VerifierError>;
}
