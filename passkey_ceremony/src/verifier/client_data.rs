use ring::digest;
use serde::Deserialize;
use subtle::ConstantTimeEq;

use crate::utils::base64url_decode;

use super::errors::VerifierError;

pub(super) const TYPE_CREATE: &str = "webauthn.create";
pub(super) const TYPE_GET: &str = "webauthn.get";

#[derive(Deserialize)]
struct CollectedClientData {
    #[serde(rename = "type")]
    type_: String,
    challenge: String,
    origin: String,
}

#[derive(Debug)]
pub(super) struct ParsedClientData {
    pub(super) type_: String,
    pub(super) challenge: String,
    pub(super) origin: String,
    /// Exact bytes the client signed over; hashing must use these, not a re-serialization
    pub(super) raw_data: Vec<u8>,
}

impl ParsedClientData {
    pub(super) fn from_base64(client_data_json: &str) -> Result<Self, VerifierError> {
        let raw_data = base64url_decode(client_data_json)
            .map_err(|e| VerifierError::Format(format!("Failed to decode: {e}")))?;

        let data: CollectedClientData = serde_json::from_slice(&raw_data)
            .map_err(|e| VerifierError::ClientData(format!("Invalid JSON: {e}")))?;

        Ok(Self {
            type_: data.type_,
            challenge: data.challenge,
            origin: data.origin,
            raw_data,
        })
    }

    pub(super) fn verify(
        &self,
        expected_type: &str,
        expected_challenge: &str,
        expected_origins: &[String],
    ) -> Result<(), VerifierError> {
        if self.type_ != expected_type {
            return Err(VerifierError::ClientData(format!(
                "Invalid type. Expected '{}', Got: {}",
                expected_type, self.type_
            )));
        }

        let received = self.challenge.trim_end_matches('=').as_bytes();
        let expected = expected_challenge.trim_end_matches('=').as_bytes();
        if !bool::from(received.ct_eq(expected)) {
            return Err(VerifierError::ClientData("Challenge mismatch".into()));
        }

        if !expected_origins.iter().any(|o| o == &self.origin) {
            return Err(VerifierError::ClientData(format!(
                "Invalid origin. Expected one of: {:?}, Got: {}",
                expected_origins, self.origin
            )));
        }

        Ok(())
    }

    pub(super) fn hash(&self) -> digest::Digest {
        digest::digest(&digest::SHA256, &self.raw_data)
    }
}
