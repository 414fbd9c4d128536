use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::ceremony::CeremonyError;
use crate::config::TokenConfig;
use crate::types::Identity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and checks the HS256 session tokens handed out after a
/// successful ceremony.
pub struct JwtIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expires_in_secs: i64,
}

impl JwtIssuer {
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(&config.secret),
            decoding_key: DecodingKey::from_secret(&config.secret),
            expires_in_secs: config.expires_in_secs,
        }
    }

    pub fn issue(&self, identity: &Identity) -> Result<String, CeremonyError> {
        let iat = Utc::now().timestamp();
        let exp = iat
            .checked_add(self.expires_in_secs)
            .ok_or_else(|| CeremonyError::Token("Token expiry out of range".to_string()))?;
        let claims = Claims {
            email: identity.to_string(),
            iat,
            exp,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| CeremonyError::Token(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, CeremonyError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| CeremonyError::Token(e.to_string()))
    }
}
