use async_trait::async_trait;
use uuid::Uuid;

use crate::utils::base64url_decode;

use super::attestation::{AttestationObject, verify_attestation_statement};
use super::authenticator_data::AuthenticatorData;
use super::client_data::{ParsedClientData, TYPE_CREATE, TYPE_GET};
use super::cose::CosePublicKey;
use super::errors::VerifierError;
use super::{
    AuthenticationInfo, AuthenticationVerificationRequest, CredentialVerifier, RegistrationInfo,
    RegistrationVerificationRequest, VerifiedAuthentication, VerifiedRegistration,
};

/// In-process verifier built on `ring`, `ciborium` and `webpki`.
///
/// Supports ES256 and RS256 credential keys and the `none` and `packed`
/// attestation formats.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeVerifier;

impl NativeVerifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CredentialVerifier for NativeVerifier {
    async fn verify_registration(
        &self,
        request: RegistrationVerificationRequest<'_>,
    ) -> Result<VerifiedRegistration, VerifierError> {
        let credential = request.response;

        if credential.id != credential.raw_id.to_base64url() {
            return Err(VerifierError::Format("id does not match rawId".into()));
        }

        let client_data = ParsedClientData::from_base64(&credential.response.client_data_json)?;
        client_data.verify(
            TYPE_CREATE,
            request.expected_challenge,
            request.expected_origins,
        )?;

        let attestation = AttestationObject::from_base64(&credential.response.attestation_object)?;
        let auth_data = AuthenticatorData::from_bytes(attestation.auth_data.clone())?;
        auth_data.verify(request.expected_rp_id, request.require_user_verification)?;

        let attested = auth_data.attested_credential.as_ref().ok_or_else(|| {
            VerifierError::AuthenticatorData("No attested credential data".into())
        })?;
        if attested.credential_id != credential.raw_id.as_bytes() {
            return Err(VerifierError::Format(
                "Credential id in authenticator data does not match rawId".into(),
            ));
        }

        let credential_key = CosePublicKey::from_cose(&attested.public_key)?;
        verify_attestation_statement(&attestation, &credential_key, client_data.hash().as_ref())?;

        let aaguid = Uuid::from_bytes(attested.aaguid).hyphenated().to_string();
        tracing::debug!(
            fmt = %attestation.fmt,
            aaguid = %aaguid,
            alg = credential_key.algorithm(),
            "Registration response verified"
        );

        Ok(VerifiedRegistration {
            verified: true,
            registration_info: Some(RegistrationInfo {
                credential_id: credential.raw_id.clone(),
                public_key: attested.public_key.clone(),
                sign_count: auth_data.counter,
                aaguid,
                user_verified: auth_data.is_user_verified(),
            }),
        })
    }

    async fn verify_authentication(
        &self,
        request: AuthenticationVerificationRequest<'_>,
    ) -> Result<VerifiedAuthentication, VerifierError> {
        let credential = request.response;

        if credential.id != credential.raw_id.to_base64url() {
            return Err(VerifierError::Format("id does not match rawId".into()));
        }
        if credential.raw_id != request.authenticator.credential_id {
            return Err(VerifierError::Format(
                "Assertion is for a different credential".into(),
            ));
        }

        let client_data = ParsedClientData::from_base64(&credential.response.client_data_json)?;
        client_data.verify(TYPE_GET, request.expected_challenge, request.expected_origins)?;

        let auth_data = AuthenticatorData::from_base64(&credential.response.authenticator_data)?;
        auth_data.verify(request.expected_rp_id, request.require_user_verification)?;

        let signature = base64url_decode(&credential.response.signature)
            .map_err(|e| VerifierError::Format(format!("Failed to decode signature: {e}")))?;

        let public_key = CosePublicKey::from_cose(&request.authenticator.public_key)?;

        // Signed data is authenticatorData || SHA-256(clientDataJSON)
        let mut signed_data = auth_data.raw_data.clone();
        signed_data.extend_from_slice(client_data.hash().as_ref());
        public_key.verify_signature(&signed_data, &signature)?;

        Ok(VerifiedAuthentication {
            verified: true,
            authentication_info: Some(AuthenticationInfo {
                credential_id: credential.raw_id.clone(),
                new_counter: auth_data.counter,
                user_verified: auth_data.is_user_verified(),
                backed_up: auth_data.is_backed_up(),
            }),
        })
    }
}
