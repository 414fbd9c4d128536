use ciborium::value::Value as CborValue;
use ring::digest;

use crate::utils::base64url_decode;

use super::errors::VerifierError;

const RP_ID_HASH_LEN: usize = 32;
const HEADER_LEN: usize = 37;
const AAGUID_LEN: usize = 16;
const MAX_CREDENTIAL_ID_LEN: usize = 1023;

/// Authenticator data flag bits (WebAuthn Level 2, section 6.1)
mod auth_data_flags {
    /// User Present (UP) - Bit 0
    pub(super) const UP: u8 = 1 << 0;
    /// User Verified (UV) - Bit 2
    pub(super) const UV: u8 = 1 << 2;
    /// Backup Eligibility (BE) - Bit 3
    pub(super) const BE: u8 = 1 << 3;
    /// Backup State (BS) - Bit 4
    pub(super) const BS: u8 = 1 << 4;
    /// Attested Credential Data Present - Bit 6
    pub(super) const AT: u8 = 1 << 6;
    /// Extension Data Present - Bit 7
    pub(super) const ED: u8 = 1 << 7;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct AttestedCredentialData {
    pub(super) aaguid: [u8; AAGUID_LEN],
    pub(super) credential_id: Vec<u8>,
    /// The COSE_Key exactly as encoded by the authenticator
    pub(super) public_key: Vec<u8>,
}

/// Authenticator data as defined in WebAuthn Level 2:
///
/// ```text
/// rpIdHash (32) | flags (1) | signCount (4, big endian)
///   [ aaguid (16) | credIdLen (2) | credId | COSE_Key ]   when AT is set
///   [ extensions (CBOR map) ]                             when ED is set
/// ```
#[derive(Debug)]
pub(super) struct AuthenticatorData {
    pub(super) rp_id_hash: [u8; RP_ID_HASH_LEN],
    pub(super) flags: u8,
    pub(super) counter: u32,
    pub(super) attested_credential: Option<AttestedCredentialData>,
    /// Raw authenticator data for signature verification
    pub(super) raw_data: Vec<u8>,
}

impl AuthenticatorData {
    pub(super) fn from_base64(auth_data: &str) -> Result<Self, VerifierError> {
        let data = base64url_decode(auth_data)
            .map_err(|e| VerifierError::Format(format!("Failed to decode: {e}")))?;
        Self::from_bytes(data)
    }

    pub(super) fn from_bytes(data: Vec<u8>) -> Result<Self, VerifierError> {
        if data.len() < HEADER_LEN {
            return Err(VerifierError::AuthenticatorData(format!(
                "Authenticator data too short: {} bytes",
                data.len()
            )));
        }

        let mut rp_id_hash = [0u8; RP_ID_HASH_LEN];
        rp_id_hash.copy_from_slice(&data[..RP_ID_HASH_LEN]);
        let flags = data[32];
        let counter = u32::from_be_bytes([data[33], data[34], data[35], data[36]]);

        let attested_credential = if flags & auth_data_flags::AT != 0 {
            Some(parse_attested_credential(&data[HEADER_LEN..])?)
        } else {
            None
        };

        Ok(Self {
            rp_id_hash,
            flags,
            counter,
            attested_credential,
            raw_data: data,
        })
    }

    pub(super) fn is_user_present(&self) -> bool {
        (self.flags & auth_data_flags::UP) != 0
    }

    pub(super) fn is_user_verified(&self) -> bool {
        (self.flags & auth_data_flags::UV) != 0
    }

    pub(super) fn is_backup_eligible(&self) -> bool {
        (self.flags & auth_data_flags::BE) != 0
    }

    pub(super) fn is_backed_up(&self) -> bool {
        (self.flags & auth_data_flags::BS) != 0
    }

    pub(super) fn has_extension_data(&self) -> bool {
        (self.flags & auth_data_flags::ED) != 0
    }

    /// Checks the rpIdHash and the UP/UV flags.
    pub(super) fn verify(&self, rp_id: &str, require_user_verification: bool) -> Result<(), VerifierError> {
        let expected_hash = digest::digest(&digest::SHA256, rp_id.as_bytes());
        if self.rp_id_hash.as_slice() != expected_hash.as_ref() {
            return Err(VerifierError::AuthenticatorData(
                "RP ID hash does not match the relying party".into(),
            ));
        }

        if !self.is_user_present() {
            return Err(VerifierError::AuthenticatorData("User not present".into()));
        }

        if require_user_verification && !self.is_user_verified() {
            return Err(VerifierError::AuthenticatorData(format!(
                "User verification required but flag not set. Flags: {:02x}",
                self.flags
            )));
        }

        tracing::debug!(
            user_verified = self.is_user_verified(),
            backup_eligible = self.is_backup_eligible(),
            backed_up = self.is_backed_up(),
            extensions = self.has_extension_data(),
            counter = self.counter,
            "Authenticator data verification passed"
        );

        Ok(())
    }
}

fn parse_attested_credential(data: &[u8]) -> Result<AttestedCredentialData, VerifierError> {
    if data.len() < AAGUID_LEN + 2 {
        return Err(VerifierError::AuthenticatorData(
            "Attested credential data too short".into(),
        ));
    }

    let mut aaguid = [0u8; AAGUID_LEN];
    aaguid.copy_from_slice(&data[..AAGUID_LEN]);
    let id_len = u16::from_be_bytes([data[AAGUID_LEN], data[AAGUID_LEN + 1]]) as usize;
    let id_start = AAGUID_LEN + 2;
    let id_end = id_start + id_len;

    if id_len == 0 || id_len > MAX_CREDENTIAL_ID_LEN || data.len() < id_end {
        return Err(VerifierError::AuthenticatorData(format!(
            "Invalid credential id length: {id_len}"
        )));
    }
    let credential_id = data[id_start..id_end].to_vec();

    // The COSE key has no length prefix; decode one CBOR item and measure what it consumed
    let key_bytes = &data[id_end..];
    let mut reader = key_bytes;
    let _: CborValue = ciborium::de::from_reader(&mut reader).map_err(|e| {
        VerifierError::AuthenticatorData(format!("Invalid credential public key: {e}"))
    })?;
    let consumed = key_bytes.len() - reader.len();

    Ok(AttestedCredentialData {
        aaguid,
        credential_id,
        public_key: key_bytes[..consumed].to_vec(),
    })
}
