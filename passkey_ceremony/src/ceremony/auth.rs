use subtle::ConstantTimeEq;

use crate::types::{Authenticator, Identity, User};
use crate::utils::gen_random_string;
use crate::verifier::AuthenticationVerificationRequest;

use super::challenge::ChallengeKey;
use super::errors::CeremonyError;
use super::types::{
    AuthenticationCredential, AuthenticationOptions, AuthenticationOptionsRequest,
    AuthenticationVerifyRequest, CredentialDescriptor, PublicKeyCredentialType, TokenResponse,
};
use super::CeremonyEngine;

const AUTH_ID_LEN: usize = 16;

impl CeremonyEngine {
    /// Issues request options. With an identity, the challenge is keyed by it
    /// and `allowCredentials` lists its authenticators; without one, an
    /// opaque `authId` is minted for a discoverable-credential ceremony.
    pub async fn generate_authentication_options(
        &self,
        request: AuthenticationOptionsRequest,
    ) -> Result<AuthenticationOptions, CeremonyError> {
        let (key, allow_credentials, auth_id) = match request.email {
            Some(identity) => {
                let user = self.credentials.get_user(&identity).await?.ok_or_else(|| {
                    tracing::info!(%identity, "Authentication options for unknown user");
                    CeremonyError::UnknownCredential
                })?;
                let allow_credentials = user
                    .authenticators
                    .iter()
                    .map(|a| CredentialDescriptor {
                        type_: PublicKeyCredentialType::PublicKey,
                        id: a.credential_id.clone(),
                        transports: a.transports.clone(),
                    })
                    .collect();
                (ChallengeKey::authentication(&identity), allow_credentials, None)
            }
            None => {
                let auth_id = gen_random_string(AUTH_ID_LEN)?;
                (
                    ChallengeKey::authentication_session(&auth_id),
                    Vec::new(),
                    Some(auth_id),
                )
            }
        };

        let stored = self.challenges.issue(&key, None).await?;

        Ok(AuthenticationOptions {
            challenge: stored.challenge,
            timeout: self.timeout_millis(),
            rp_id: self.rp.rp_id.clone(),
            allow_credentials,
            user_verification: "preferred".to_string(),
            auth_id,
        })
    }

    /// Consumes the pending challenge, resolves the credential, verifies the
    /// assertion and enforces the signature counter rule before issuing a
    /// session token.
    pub async fn verify_authentication(
        &self,
        request: AuthenticationVerifyRequest,
    ) -> Result<TokenResponse, CeremonyError> {
        let credential = request.credential;

        let key = match (&request.email, &request.auth_id) {
            (Some(identity), _) => ChallengeKey::authentication(identity),
            (None, Some(auth_id)) => ChallengeKey::authentication_session(auth_id),
            (None, None) => {
                return Err(CeremonyError::InvalidRequest(
                    "Either email or authId is required".into(),
                ));
            }
        };

        let stored = self.challenges.consume(&key).await?.ok_or_else(|| {
            tracing::warn!(credential_id = %credential.raw_id, "No pending authentication challenge");
            CeremonyError::InvalidOrExpiredChallenge
        })?;

        let (user, authenticator) = self
            .resolve_authenticator(request.email.as_ref(), &credential)
            .await?;

        check_user_handle(&user, &credential, request.email.is_none())?;

        let verification = self
            .run_verifier(
                &user.identity,
                &authenticator.credential_id,
                self.verifier
                    .verify_authentication(AuthenticationVerificationRequest {
                        response: &credential,
                        expected_challenge: &stored.challenge,
                        expected_origins: &self.rp.rp_origins,
                        expected_rp_id: &self.rp.rp_id,
                        authenticator: &authenticator,
                        require_user_verification: true,
                    }),
            )
            .await?;

        let info = match (verification.verified, verification.authentication_info) {
            (true, Some(info)) => info,
            _ => {
                tracing::warn!(identity = %user.identity, "Authentication response not verified");
                return Err(CeremonyError::VerificationFailed);
            }
        };

        self.apply_sign_count(&authenticator, info.new_counter).await?;

        tracing::info!(
            identity = %user.identity,
            credential_id = %authenticator.credential_id,
            backed_up = info.backed_up,
            "Authenticated with passkey"
        );

        Ok(TokenResponse {
            token: self.tokens.issue(&user.identity)?,
        })
    }

    async fn resolve_authenticator(
        &self,
        identity: Option<&Identity>,
        credential: &AuthenticationCredential,
    ) -> Result<(User, Authenticator), CeremonyError> {
        let credential_id = &credential.raw_id;

        let user = match identity {
            Some(identity) => self.credentials.get_user(identity).await?,
            None => match self
                .credentials
                .find_authenticator_by_credential_id(credential_id)
                .await?
            {
                Some((owner, _)) => self.credentials.get_user(&owner).await?,
                None => None,
            },
        };

        let authenticator = user
            .as_ref()
            .and_then(|u| u.authenticator(credential_id))
            .cloned();

        match (user, authenticator) {
            (Some(user), Some(authenticator)) => Ok((user, authenticator)),
            _ => {
                tracing::warn!(%credential_id, "Assertion for unknown credential");
                Err(CeremonyError::UnknownCredential)
            }
        }
    }

    /// Authenticators that never implement a counter report zero forever;
    /// anything else must strictly increase.
    async fn apply_sign_count(
        &self,
        authenticator: &Authenticator,
        new_counter: u32,
    ) -> Result<(), CeremonyError> {
        // 0/0 is accepted, so clone detection is off for this credential.
        if authenticator.sign_count == 0 && new_counter == 0 {
            tracing::warn!(
                security_event = "counterless_authenticator",
                credential_id = %authenticator.credential_id,
                "Authenticator does not implement a signature counter; clone detection unavailable"
            );
            return Ok(());
        }

        self.credentials
            .update_sign_count(&authenticator.credential_id, new_counter)
            .await
            .map_err(|e| CeremonyError::from(e).log())
    }
}

/// A returned user handle must match the stored one. Without an identity
/// the handle is the only link from the assertion to the user, so it is
/// mandatory there.
fn check_user_handle(
    user: &User,
    credential: &AuthenticationCredential,
    identity_less: bool,
) -> Result<(), CeremonyError> {
    match credential.response.user_handle.as_deref() {
        Some(handle) => {
            let received = handle.trim_end_matches('=').as_bytes();
            let expected = user.user_handle.trim_end_matches('=').as_bytes();
            if bool::from(received.ct_eq(expected)) {
                Ok(())
            } else {
                tracing::warn!(identity = %user.identity, "User handle mismatch");
                Err(CeremonyError::VerificationFailed)
            }
        }
        None if identity_less => {
            tracing::warn!(identity = %user.identity, "Missing user handle in identity-less assertion");
            Err(CeremonyError::VerificationFailed)
        }
        None => Ok(()),
    }
}
