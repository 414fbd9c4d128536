use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

const MIN_JWT_SECRET_LEN: usize = 32;
/// One day
pub(crate) const MAX_CHALLENGE_TTL_SECS: u64 = 86_400;
/// Thirty days
pub(crate) const MAX_TOKEN_LIFETIME_SECS: i64 = 2_592_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Relying party identity and the origins allowed to run ceremonies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelyingPartyConfig {
    pub rp_id: String,
    pub rp_name: String,
    pub rp_origins: Vec<String>,
}

impl RelyingPartyConfig {
    pub fn new(
        rp_id: impl Into<String>,
        rp_name: impl Into<String>,
        rp_origins: Vec<String>,
    ) -> Result<Self, ConfigError> {
        let rp_id = rp_id.into();
        if rp_id.trim().is_empty() {
            return Err(ConfigError::Missing("WEBAUTHN_RPID"));
        }
        if rp_origins.is_empty() {
            return Err(ConfigError::Missing("WEBAUTHN_RPORIGIN"));
        }
        Ok(Self {
            rp_id,
            rp_name: rp_name.into(),
            rp_origins,
        })
    }

    /// Reads `WEBAUTHN_RPID`, `WEBAUTHN_RPNAME`, `WEBAUTHN_RPORIGIN` and the
    /// optional `WEBAUTHN_ANDROID_CERT_FINGERPRINTS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let rp_id = required_env("WEBAUTHN_RPID")?;
        let rp_name = required_env("WEBAUTHN_RPNAME")?;
        let origins = required_env("WEBAUTHN_RPORIGIN")?;
        let android = env::var("WEBAUTHN_ANDROID_CERT_FINGERPRINTS").ok();

        Self::new(
            rp_id,
            rp_name,
            allowed_origins(&origins, android.as_deref()),
        )
    }
}

/// Splits a comma-separated origin list and appends one
/// `android:apk-key-hash:<fingerprint>` origin per Android signing key.
pub(crate) fn allowed_origins(origins: &str, android_fingerprints: Option<&str>) -> Vec<String> {
    let web = origins
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let android = android_fingerprints
        .into_iter()
        .flat_map(|fps| fps.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|fp| format!("android:apk-key-hash:{fp}"));

    web.chain(android).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CeremonyConfig {
    /// Client-side ceremony timeout advertised in options, in seconds
    pub timeout_secs: u32,
    pub challenge_ttl_secs: u64,
    pub verifier_timeout: Duration,
}

impl Default for CeremonyConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            challenge_ttl_secs: 60,
            verifier_timeout: Duration::from_secs(10),
        }
    }
}

impl CeremonyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.challenge_ttl_secs > MAX_CHALLENGE_TTL_SECS {
            return Err(ConfigError::Invalid {
                name: "PASSKEY_CHALLENGE_TIMEOUT",
                reason: format!("must be at most {MAX_CHALLENGE_TTL_SECS} seconds"),
            });
        }
        Ok(())
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            timeout_secs: env_or_default("PASSKEY_TIMEOUT", defaults.timeout_secs),
            challenge_ttl_secs: env_or_default(
                "PASSKEY_CHALLENGE_TIMEOUT",
                defaults.challenge_ttl_secs,
            ),
            verifier_timeout: Duration::from_secs(env_or_default(
                "PASSKEY_VERIFIER_TIMEOUT",
                defaults.verifier_timeout.as_secs(),
            )),
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Clone)]
pub struct TokenConfig {
    pub secret: Vec<u8>,
    pub expires_in_secs: i64,
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("expires_in_secs", &self.expires_in_secs)
            .finish()
    }
}

impl TokenConfig {
    pub fn new(secret: impl Into<Vec<u8>>, expires_in_secs: i64) -> Result<Self, ConfigError> {
        let secret = secret.into();
        if secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: "JWT_SECRET",
                reason: format!("must be at least {MIN_JWT_SECRET_LEN} bytes"),
            });
        }
        if expires_in_secs <= 0 || expires_in_secs > MAX_TOKEN_LIFETIME_SECS {
            return Err(ConfigError::Invalid {
                name: "JWT_EXPIRES_IN",
                reason: format!("must be between 1 and {MAX_TOKEN_LIFETIME_SECS} seconds"),
            });
        }
        Ok(Self {
            secret,
            expires_in_secs,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let secret = required_env("JWT_SECRET")?;
        Self::new(secret, env_or_default("JWT_EXPIRES_IN", 600))
    }
}

/// Backend selection for the challenge cache and the credential store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub cache_store_type: String,
    pub cache_store_url: String,
    pub data_store_type: String,
    pub data_store_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_store_type: "memory".to_string(),
            cache_store_url: "memory".to_string(),
            data_store_type: "memory".to_string(),
            data_store_url: "memory".to_string(),
        }
    }
}

impl StoreConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_store_type: env::var("GENERIC_CACHE_STORE_TYPE")
                .unwrap_or(defaults.cache_store_type),
            cache_store_url: env::var("GENERIC_CACHE_STORE_URL")
                .unwrap_or(defaults.cache_store_url),
            data_store_type: env::var("GENERIC_DATA_STORE_TYPE")
                .unwrap_or(defaults.data_store_type),
            data_store_url: env::var("GENERIC_DATA_STORE_URL").unwrap_or(defaults.data_store_url),
        }
    }
}

fn required_env(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn env_or_default<T: FromStr + fmt::Display>(name: &str, default: T) -> T {
    match env::var(name) {
        Err(_) => default,
        Ok(raw) => parse_or_default(name, &raw, default),
    }
}

fn parse_or_default<T: FromStr + fmt::Display>(name: &str, raw: &str, default: T) -> T {
    raw.trim().parse::<T>().unwrap_or_else(|_| {
        tracing::warn!("Invalid {}: {}. Using default '{}'", name, raw, default);
        default
    })
}
