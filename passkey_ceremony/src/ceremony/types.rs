use serde::{Deserialize, Serialize};

use crate::types::{CredentialId, Identity};

pub(crate) const ALG_ES256: i64 = -7;
pub(crate) const ALG_RS256: i64 = -257;

/// Only `"public-key"` is a valid credential type; anything else fails to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublicKeyCredentialType {
    #[serde(rename = "public-key")]
    PublicKey,
}

/// Options for `navigator.credentials.create()`.
///
/// Serialized in the WebAuthn JSON form; the client passes it to the
/// browser after decoding `challenge` and `user.id` from base64url.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOptions {
    pub challenge: String,
    pub rp: RelyingParty,
    pub user: PublicKeyCredentialUserEntity,
    pub pub_key_cred_params: Vec<PubKeyCredParam>,
    /// Milliseconds
    pub timeout: u64,
    pub attestation: String,
    pub authenticator_selection: AuthenticatorSelection,
    pub exclude_credentials: Vec<CredentialDescriptor>,
}

#[derive(Serialize, Debug, Clone)]
pub struct RelyingParty {
    pub name: String,
    pub id: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyCredentialUserEntity {
    /// Base64url user handle
    pub id: String,
    pub name: String,
    pub display_name: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct PubKeyCredParam {
    #[serde(rename = "type")]
    pub type_: PublicKeyCredentialType,
    pub alg: i64,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelection {
    pub resident_key: String,
    pub require_resident_key: bool,
    pub user_verification: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct CredentialDescriptor {
    #[serde(rename = "type")]
    pub type_: PublicKeyCredentialType,
    pub id: CredentialId,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transports: Vec<String>,
}

/// Options for `navigator.credentials.get()`.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationOptions {
    pub challenge: String,
    /// Milliseconds
    pub timeout: u64,
    pub rp_id: String,
    pub allow_credentials: Vec<CredentialDescriptor>,
    pub user_verification: String,
    /// Present only for identity-less (discoverable credential) ceremonies;
    /// the client echoes it back when verifying.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_id: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RegistrationOptionsRequest {
    pub email: Identity,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct AuthenticationOptionsRequest {
    #[serde(default)]
    pub email: Option<Identity>,
}

/// Body of the registration verification call: the browser's
/// `PublicKeyCredential` JSON plus the identity it was created for.
#[derive(Deserialize, Debug, Clone)]
pub struct RegistrationVerifyRequest {
    pub email: Identity,
    #[serde(flatten)]
    pub credential: RegistrationCredential,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationVerifyRequest {
    #[serde(default)]
    pub email: Option<Identity>,
    #[serde(default)]
    pub auth_id: Option<String>,
    #[serde(flatten)]
    pub credential: AuthenticationCredential,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationCredential {
    pub id: String,
    pub raw_id: CredentialId,
    pub response: AuthenticatorAttestationResponse,
    #[serde(rename = "type")]
    pub type_: PublicKeyCredentialType,
    #[serde(default)]
    pub authenticator_attachment: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorAttestationResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    pub attestation_object: String,
    #[serde(default)]
    pub transports: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationCredential {
    pub id: String,
    pub raw_id: CredentialId,
    pub response: AuthenticatorAssertionResponse,
    #[serde(rename = "type")]
    pub type_: PublicKeyCredentialType,
    #[serde(default)]
    pub authenticator_attachment: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorAssertionResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    pub authenticator_data: String,
    pub signature: String,
    #[serde(default)]
    pub user_handle: Option<String>,
}

/// Session token issued after a successful ceremony.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenResponse {
    pub token: String,
}
