use ciborium::value::Value as CborValue;
use ring::signature::{
    ECDSA_P256_SHA256_ASN1, RSA_PKCS1_2048_8192_SHA256, RsaPublicKeyComponents, UnparsedPublicKey,
};

use crate::ceremony::{ALG_ES256, ALG_RS256};

use super::errors::VerifierError;

// COSE_Key labels (RFC 9052 / RFC 9053)
const LABEL_KTY: i64 = 1;
const LABEL_ALG: i64 = 3;
const LABEL_CRV: i64 = -1;
const LABEL_X: i64 = -2;
const LABEL_Y: i64 = -3;
const LABEL_N: i64 = -1;
const LABEL_E: i64 = -2;

const KTY_EC2: i64 = 2;
const KTY_RSA: i64 = 3;
const CRV_P256: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum CosePublicKey {
    Es256 { x: Vec<u8>, y: Vec<u8> },
    Rs256 { n: Vec<u8>, e: Vec<u8> },
}

pub(super) fn map_lookup(map: &[(CborValue, CborValue)], label: i64) -> Option<&CborValue> {
    map.iter()
        .find(|(k, _)| {
            k.as_integer()
                .and_then(|i| i64::try_from(i).ok())
                .is_some_and(|i| i == label)
        })
        .map(|(_, v)| v)
}

pub(super) fn map_lookup_text<'a>(
    map: &'a [(CborValue, CborValue)],
    name: &str,
) -> Option<&'a CborValue> {
    map.iter()
        .find(|(k, _)| k.as_text() == Some(name))
        .map(|(_, v)| v)
}

fn int_field(map: &[(CborValue, CborValue)], label: i64) -> Result<i64, VerifierError> {
    map_lookup(map, label)
        .and_then(|v| v.as_integer())
        .and_then(|i| i64::try_from(i).ok())
        .ok_or_else(|| VerifierError::PublicKey(format!("Missing integer label {label}")))
}

fn bytes_field(map: &[(CborValue, CborValue)], label: i64) -> Result<Vec<u8>, VerifierError> {
    map_lookup(map, label)
        .and_then(|v| v.as_bytes())
        .cloned()
        .ok_or_else(|| VerifierError::PublicKey(format!("Missing byte string label {label}")))
}

impl CosePublicKey {
    pub(super) fn from_cose(bytes: &[u8]) -> Result<Self, VerifierError> {
        let value: CborValue = ciborium::de::from_reader(bytes)
            .map_err(|e| VerifierError::PublicKey(format!("Invalid CBOR: {e}")))?;
        let map = value
            .as_map()
            .ok_or_else(|| VerifierError::PublicKey("COSE key is not a map".into()))?;

        let kty = int_field(map, LABEL_KTY)?;
        let alg = int_field(map, LABEL_ALG)?;

        match (kty, alg) {
            (KTY_EC2, ALG_ES256) => {
                let crv = int_field(map, LABEL_CRV)?;
                if crv != CRV_P256 {
                    return Err(VerifierError::PublicKey(format!("Unsupported curve: {crv}")));
                }
                let x = bytes_field(map, LABEL_X)?;
                let y = bytes_field(map, LABEL_Y)?;
                if x.len() != 32 || y.len() != 32 {
                    return Err(VerifierError::PublicKey(
                        "P-256 coordinates must be 32 bytes".into(),
                    ));
                }
                Ok(Self::Es256 { x, y })
            }
            (KTY_RSA, ALG_RS256) => Ok(Self::Rs256 {
                n: bytes_field(map, LABEL_N)?,
                e: bytes_field(map, LABEL_E)?,
            }),
            (_, alg) => Err(VerifierError::UnsupportedAlgorithm(alg)),
        }
    }

    pub(super) fn algorithm(&self) -> i64 {
        match self {
            Self::Es256 { .. } => ALG_ES256,
            Self::Rs256 { .. } => ALG_RS256,
        }
    }

    /// Verifies `signature` over `signed_data`; ring hashes with SHA-256 internally.
    pub(super) fn verify_signature(
        &self,
        signed_data: &[u8],
        signature: &[u8],
    ) -> Result<(), VerifierError> {
        match self {
            Self::Es256 { x, y } => {
                // Uncompressed SEC1 point: 0x04 || x || y
                let mut point = Vec::with_capacity(65);
                point.push(0x04);
                point.extend_from_slice(x);
                point.extend_from_slice(y);
                UnparsedPublicKey::new(&ECDSA_P256_SHA256_ASN1, &point)
                    .verify(signed_data, signature)
                    .map_err(|_| VerifierError::Signature("ES256 signature is invalid".into()))
            }
            Self::Rs256 { n, e } => RsaPublicKeyComponents { n, e }
                .verify(&RSA_PKCS1_2048_8192_SHA256, signed_data, signature)
                .map_err(|_| VerifierError::Signature("RS256 signature is invalid".into())),
        }
    }
}
