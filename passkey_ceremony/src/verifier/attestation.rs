use ciborium::value::Value as CborValue;
use webpki::EndEntityCert;

use crate::ceremony::{ALG_ES256, ALG_RS256};
use crate::utils::base64url_decode;

use super::cose::{CosePublicKey, map_lookup_text};
use super::errors::VerifierError;

#[derive(Debug)]
pub(super) struct AttestationObject {
    pub(super) fmt: String,
    pub(super) auth_data: Vec<u8>,
    pub(super) att_stmt: Vec<(CborValue, CborValue)>,
}

impl AttestationObject {
    pub(super) fn from_base64(attestation_object: &str) -> Result<Self, VerifierError> {
        let bytes = base64url_decode(attestation_object)
            .map_err(|e| VerifierError::Format(format!("Failed to decode: {e}")))?;
        let value: CborValue = ciborium::de::from_reader(bytes.as_slice())
            .map_err(|e| VerifierError::Attestation(format!("Invalid CBOR: {e}")))?;
        let map = value
            .as_map()
            .ok_or_else(|| VerifierError::Attestation("Attestation object is not a map".into()))?;

        let fmt = map_lookup_text(map, "fmt")
            .and_then(|v| v.as_text())
            .ok_or_else(|| VerifierError::Attestation("Missing fmt".into()))?
            .to_string();
        let auth_data = map_lookup_text(map, "authData")
            .and_then(|v| v.as_bytes())
            .ok_or_else(|| VerifierError::Attestation("Missing authData".into()))?
            .clone();
        let att_stmt = map_lookup_text(map, "attStmt")
            .and_then(|v| v.as_map())
            .ok_or_else(|| VerifierError::Attestation("Missing attStmt".into()))?
            .clone();

        Ok(Self {
            fmt,
            auth_data,
            att_stmt,
        })
    }
}

/// Verifies the attestation statement. `none` and `packed` (self or x5c
/// leaf) are accepted; certificate chains are not validated against any
/// trust anchor.
pub(super) fn verify_attestation_statement(
    attestation: &AttestationObject,
    credential_key: &CosePublicKey,
    client_data_hash: &[u8],
) -> Result<(), VerifierError> {
    match attestation.fmt.as_str() {
        "none" => {
            tracing::debug!("Using 'none' attestation format");
            if !attestation.att_stmt.is_empty() {
                return Err(VerifierError::Attestation(
                    "attStmt must be empty for none attestation".into(),
                ));
            }
            Ok(())
        }
        "packed" => {
            tracing::debug!("Using 'packed' attestation format");
            verify_packed(attestation, credential_key, client_data_hash)
        }
        other => Err(VerifierError::Attestation(format!(
            "Unsupported attestation format: {other}"
        ))),
    }
}

fn verify_packed(
    attestation: &AttestationObject,
    credential_key: &CosePublicKey,
    client_data_hash: &[u8],
) -> Result<(), VerifierError> {
    let stmt = &attestation.att_stmt;

    let alg = map_lookup_text(stmt, "alg")
        .and_then(|v| v.as_integer())
        .and_then(|i| i64::try_from(i).ok())
        .ok_or_else(|| VerifierError::Attestation("Missing alg in attStmt".into()))?;
    let sig = map_lookup_text(stmt, "sig")
        .and_then(|v| v.as_bytes())
        .ok_or_else(|| VerifierError::Attestation("Missing sig in attStmt".into()))?;

    if map_lookup_text(stmt, "ecdaaKeyId").is_some() {
        return Err(VerifierError::Attestation(
            "ECDAA attestation not supported".into(),
        ));
    }

    let mut signed_data = Vec::with_capacity(attestation.auth_data.len() + client_data_hash.len());
    signed_data.extend_from_slice(&attestation.auth_data);
    signed_data.extend_from_slice(client_data_hash);

    match map_lookup_text(stmt, "x5c") {
        Some(x5c) => {
            tracing::debug!("Full attestation with certificate chain");
            let leaf = x5c
                .as_array()
                .and_then(|certs| certs.first())
                .and_then(|cert| cert.as_bytes())
                .ok_or_else(|| VerifierError::Attestation("Empty or malformed x5c".into()))?;

            let cert = EndEntityCert::try_from(leaf.as_slice()).map_err(|e| {
                VerifierError::Attestation(format!(
                    "Failed to parse attestation certificate: {e:?}"
                ))
            })?;

            let signature_alg = match alg {
                ALG_ES256 => &webpki::ECDSA_P256_SHA256,
                ALG_RS256 => &webpki::RSA_PKCS1_2048_8192_SHA256,
                other => return Err(VerifierError::UnsupportedAlgorithm(other)),
            };

            cert.verify_signature(signature_alg, &signed_data, sig)
                .map_err(|_| VerifierError::Signature("Attestation signature invalid".into()))
        }
        None => {
            tracing::debug!("Self attestation");
            if alg != credential_key.algorithm() {
                return Err(VerifierError::Attestation(format!(
                    "Self attestation alg {} does not match credential key alg {}",
                    alg,
                    credential_key.algorithm()
                )));
            }
            credential_key.verify_signature(&signed_data, sig)
        }
    }
}
