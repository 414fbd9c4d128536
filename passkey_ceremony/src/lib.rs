//! passkey-ceremony - server side of WebAuthn passkey registration and authentication
//!
//! The crate issues challenges, hands browser responses to a pluggable
//! [`CredentialVerifier`], enforces single-use challenges and signature
//! counter monotonicity, persists credentials through a [`CredentialStore`],
//! and issues a short-lived session token after each successful ceremony.

mod ceremony;
mod config;
mod storage;
mod token;
mod types;
mod utils;
mod verifier;

use std::sync::Arc;

pub use ceremony::{
    AuthenticationCredential, AuthenticationOptions, AuthenticationOptionsRequest,
    AuthenticationVerifyRequest, AuthenticatorAssertionResponse, AuthenticatorAttestationResponse,
    AuthenticatorSelection, CeremonyEngine, CeremonyError, CredentialDescriptor, PubKeyCredParam,
    PublicKeyCredentialType, PublicKeyCredentialUserEntity, RegistrationCredential,
    RegistrationOptions, RegistrationOptionsRequest, RegistrationVerifyRequest, RelyingParty,
    TokenResponse,
};

pub use config::{CeremonyConfig, ConfigError, RelyingPartyConfig, StoreConfig, TokenConfig};

pub use storage::{
    CacheData, CacheStore, CredentialStore, InMemoryCacheStore, InMemoryCredentialStore,
    RedisCacheStore, SqliteCredentialStore, StorageError, cache_store_from_config,
    credential_store_from_config,
};

pub use token::{Claims, JwtIssuer};

pub use types::{Authenticator, CredentialId, Identity, User};

pub use utils::UtilError;

pub use verifier::{
    AuthenticationInfo, AuthenticationVerificationRequest, CredentialVerifier, NativeVerifier,
    RegistrationInfo, RegistrationVerificationRequest, VerifiedAuthentication,
    VerifiedRegistration, VerifierError,
};

/// Builds a ceremony engine from environment variables, with the native
/// verifier and the stores named by `GENERIC_CACHE_STORE_TYPE` and
/// `GENERIC_DATA_STORE_TYPE`.
pub async fn init() -> Result<CeremonyEngine, CeremonyError> {
    let rp = RelyingPartyConfig::from_env()?;
    let ceremony_config = CeremonyConfig::from_env()?;
    let token_config = TokenConfig::from_env()?;
    let store_config = StoreConfig::from_env();

    let cache = cache_store_from_config(&store_config).await?;
    let credentials = credential_store_from_config(&store_config).await?;

    tracing::info!(
        rp_id = %rp.rp_id,
        origins = ?rp.rp_origins,
        "Passkey ceremony engine initialized"
    );

    Ok(CeremonyEngine::new(
        rp,
        ceremony_config,
        credentials,
        cache,
        Arc::new(NativeVerifier::new()),
        JwtIssuer::new(&token_config),
    ))
}
