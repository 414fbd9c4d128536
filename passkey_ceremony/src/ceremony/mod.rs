mod auth;
mod challenge;
mod errors;
mod register;
mod types;

use std::future::Future;
use std::sync::Arc;

use crate::config::{CeremonyConfig, RelyingPartyConfig};
use crate::storage::{CacheStore, CredentialStore};
use crate::token::JwtIssuer;
use crate::types::{CredentialId, Identity};
use crate::verifier::{CredentialVerifier, VerifierError};

use challenge::ChallengeStore;

pub use errors::CeremonyError;
pub(crate) use types::{ALG_ES256, ALG_RS256};
pub use types::{
    AuthenticationCredential, AuthenticationOptions, AuthenticationOptionsRequest,
    AuthenticationVerifyRequest, AuthenticatorAssertionResponse, AuthenticatorAttestationResponse,
    AuthenticatorSelection, CredentialDescriptor, PubKeyCredParam, PublicKeyCredentialType,
    PublicKeyCredentialUserEntity, RegistrationCredential, RegistrationOptions,
    RegistrationOptionsRequest, RegistrationVerifyRequest, RelyingParty, TokenResponse,
};

/// Runs the four WebAuthn ceremony operations against injected stores,
/// verifier and token issuer.
///
/// Every operation is a single async call holding no locks across awaits;
/// the engine itself is stateless and can be shared behind an `Arc`.
pub struct CeremonyEngine {
    rp: RelyingPartyConfig,
    config: CeremonyConfig,
    credentials: Arc<dyn CredentialStore>,
    challenges: ChallengeStore,
    verifier: Arc<dyn CredentialVerifier>,
    tokens: JwtIssuer,
}

impl CeremonyEngine {
    pub fn new(
        rp: RelyingPartyConfig,
        config: CeremonyConfig,
        credentials: Arc<dyn CredentialStore>,
        cache: Arc<dyn CacheStore>,
        verifier: Arc<dyn CredentialVerifier>,
        tokens: JwtIssuer,
    ) -> Self {
        let challenges = ChallengeStore::new(cache, config.challenge_ttl_secs);
        Self {
            rp,
            config,
            credentials,
            challenges,
            verifier,
            tokens,
        }
    }

    pub fn relying_party(&self) -> &RelyingPartyConfig {
        &self.rp
    }

    pub fn token_issuer(&self) -> &JwtIssuer {
        &self.tokens
    }

    pub fn credential_store(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    fn timeout_millis(&self) -> u64 {
        u64::from(self.config.timeout_secs) * 1000
    }

    /// Runs a verifier call under the configured deadline. A verifier error
    /// is logged with its detail and surfaced as a plain verification failure.
    async fn run_verifier<T>(
        &self,
        identity: &Identity,
        credential_id: &CredentialId,
        call: impl Future<Output = Result<T, VerifierError>>,
    ) -> Result<T, CeremonyError> {
        match tokio::time::timeout(self.config.verifier_timeout, call).await {
            Err(_) => Err(CeremonyError::VerifierTimeout.log()),
            Ok(Err(e)) => {
                tracing::warn!(
                    %identity,
                    %credential_id,
                    error = %e,
                    "Verifier rejected response"
                );
                Err(CeremonyError::VerificationFailed)
            }
            Ok(Ok(result)) => Ok(result),
        }
    }
}
