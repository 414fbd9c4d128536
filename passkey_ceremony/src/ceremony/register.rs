use chrono::Utc;

use crate::types::Authenticator;
use crate::utils::gen_random_string;
use crate::verifier::RegistrationVerificationRequest;

use super::challenge::ChallengeKey;
use super::errors::CeremonyError;
use super::types::{
    ALG_ES256, ALG_RS256, AuthenticatorSelection, PubKeyCredParam, PublicKeyCredentialType,
    PublicKeyCredentialUserEntity, RegistrationOptions, RegistrationOptionsRequest,
    RegistrationVerifyRequest, RelyingParty, TokenResponse,
};
use super::CeremonyEngine;

const USER_HANDLE_LEN: usize = 32;

impl CeremonyEngine {
    /// Issues creation options for a not-yet-registered identity and stores
    /// the challenge under that identity, replacing any pending one.
    pub async fn generate_registration_options(
        &self,
        request: RegistrationOptionsRequest,
    ) -> Result<RegistrationOptions, CeremonyError> {
        let identity = request.email;

        if self.credentials.get_user(&identity).await?.is_some() {
            tracing::info!(%identity, "Registration options refused: user already exists");
            return Err(CeremonyError::IdentityAlreadyRegistered);
        }

        let user_handle = gen_random_string(USER_HANDLE_LEN)?;
        let stored = self
            .challenges
            .issue(
                &ChallengeKey::registration(&identity),
                Some(user_handle.clone()),
            )
            .await?;

        tracing::debug!(%identity, "Registration options issued");

        Ok(RegistrationOptions {
            challenge: stored.challenge,
            rp: RelyingParty {
                name: self.rp.rp_name.clone(),
                id: self.rp.rp_id.clone(),
            },
            user: PublicKeyCredentialUserEntity {
                id: user_handle,
                name: identity.to_string(),
                display_name: identity.to_string(),
            },
            pub_key_cred_params: [ALG_ES256, ALG_RS256]
                .into_iter()
                .map(|alg| PubKeyCredParam {
                    type_: PublicKeyCredentialType::PublicKey,
                    alg,
                })
                .collect(),
            timeout: self.timeout_millis(),
            attestation: "none".to_string(),
            authenticator_selection: AuthenticatorSelection {
                resident_key: "required".to_string(),
                require_resident_key: true,
                user_verification: "required".to_string(),
            },
            exclude_credentials: Vec::new(),
        })
    }

    /// Consumes the identity's registration challenge, verifies the
    /// attestation and persists the new user with its first authenticator.
    ///
    /// The challenge is spent even when verification fails.
    pub async fn verify_registration(
        &self,
        request: RegistrationVerifyRequest,
    ) -> Result<TokenResponse, CeremonyError> {
        let identity = request.email;
        let credential = request.credential;

        let stored = self
            .challenges
            .consume(&ChallengeKey::registration(&identity))
            .await?
            .ok_or_else(|| {
                tracing::warn!(%identity, "No pending registration challenge");
                CeremonyError::InvalidOrExpiredChallenge
            })?;

        let verification = self
            .run_verifier(
                &identity,
                &credential.raw_id,
                self.verifier
                    .verify_registration(RegistrationVerificationRequest {
                        response: &credential,
                        expected_challenge: &stored.challenge,
                        expected_origins: &self.rp.rp_origins,
                        expected_rp_id: &self.rp.rp_id,
                        require_user_verification: true,
                    }),
            )
            .await?;

        let info = match (verification.verified, verification.registration_info) {
            (true, Some(info)) => info,
            _ => {
                tracing::warn!(%identity, "Registration response not verified");
                return Err(CeremonyError::VerificationFailed);
            }
        };

        if info.credential_id != credential.raw_id {
            tracing::warn!(%identity, "Verified credential id differs from rawId");
            return Err(CeremonyError::VerificationFailed);
        }

        let user_handle = stored
            .user_handle
            .ok_or_else(|| CeremonyError::Internal("Registration challenge without user handle".into()))?;

        let authenticator = Authenticator {
            credential_id: info.credential_id,
            public_key: info.public_key,
            sign_count: info.sign_count,
            transports: credential.response.transports.unwrap_or_default(),
            created_at: Utc::now(),
        };
        let credential_id = authenticator.credential_id.clone();

        self.credentials
            .create_user_with_authenticator(&identity, &user_handle, authenticator)
            .await
            .map_err(|e| CeremonyError::from(e).log())?;

        tracing::info!(%identity, %credential_id, aaguid = %info.aaguid, "Registered new passkey");

        Ok(TokenResponse {
            token: self.tokens.issue(&identity)?,
        })
    }
}
