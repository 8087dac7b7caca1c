//! Centralized configuration for the Tokenizer Service.
//!
//! All configuration is loaded from environment variables and validated
//! at startup.

use crate::error::TokenizerError;
use crate::identity::{AppSecret, SecretSource};
use std::env;
use std::time::Duration;

/// Default key module for new keystores.
pub const DEFAULT_KMS_MODULE: &str = "ssm-v1";

/// Default probability of running the rotation check on `get_current`.
pub const DEFAULT_ROTATION_SAMPLE_PROBABILITY: f64 = 0.2;

/// Default bound on resolution loop iterations.
pub const DEFAULT_MAX_RESOLVE_ATTEMPTS: u32 = 16;

/// Key-custody settings.
#[derive(Debug, Clone)]
pub struct KmsSettings {
    /// Remote service base URL
    pub base_url: String,
    /// Key module for new keystores
    pub kms_module: String,
    /// Meter / usage reference
    pub meter_id: Option<String>,
    /// IP allow list applied to new keystores
    pub ip_allow_list: Option<Vec<String>>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl KmsSettings {
    /// Settings with defaults for everything but the base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            kms_module: DEFAULT_KMS_MODULE.to_string(),
            meter_id: None,
            ip_allow_list: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Lifecycle coordination settings.
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    /// Probability in `[0, 1]` that a `get_current` call consults the
    /// rotation policy
    pub rotation_sample_probability: f64,
    /// Upper bound on resolution loop iterations
    pub max_resolve_attempts: u32,
    /// Where tokenizer secrets come from
    pub secret_source: SecretSource,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            rotation_sample_probability: DEFAULT_ROTATION_SAMPLE_PROBABILITY,
            max_resolve_attempts: DEFAULT_MAX_RESOLVE_ATTEMPTS,
            secret_source: SecretSource::PerTokenizer,
        }
    }
}

impl LifecycleSettings {
    /// Validate settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the probability is outside `[0, 1]` or the
    /// attempt bound is zero.
    pub fn validate(&self) -> Result<(), TokenizerError> {
        if !(0.0..=1.0).contains(&self.rotation_sample_probability) {
            return Err(TokenizerError::config(format!(
                "Rotation sample probability must be within [0, 1], got {}",
                self.rotation_sample_probability
            )));
        }
        if self.max_resolve_attempts == 0 {
            return Err(TokenizerError::config(
                "Max resolve attempts must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Document store settings.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// MongoDB connection URI
    pub uri: String,
    /// Database name
    pub database: String,
    /// Collection holding tokenizer records
    pub collection: String,
}

/// Tokenizer Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Key-custody settings
    pub kms: KmsSettings,
    /// Lifecycle settings
    pub lifecycle: LifecycleSettings,
    /// Document store settings
    pub store: StoreSettings,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, TokenizerError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, TokenizerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("TOKENIZER_KMS_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| TokenizerError::config("TOKENIZER_KMS_BASE_URL is required"))?;

        let kms = KmsSettings {
            base_url,
            kms_module: lookup("TOKENIZER_KMS_MODULE")
                .unwrap_or_else(|| DEFAULT_KMS_MODULE.to_string()),
            meter_id: lookup("TOKENIZER_KMS_METER_ID").filter(|v| !v.is_empty()),
            ip_allow_list: lookup("TOKENIZER_KMS_IP_ALLOW_LIST")
                .map(|v| parse_list(&v))
                .filter(|list| !list.is_empty()),
            timeout: Duration::from_secs(parse_env(&lookup, "TOKENIZER_KMS_TIMEOUT_SECS", 30)?),
        };

        let secret_source = match lookup("TOKENIZER_APP_SECRET") {
            Some(encoded) => SecretSource::Application(AppSecret::from_base64url(&encoded)?),
            None => SecretSource::PerTokenizer,
        };

        let lifecycle = LifecycleSettings {
            rotation_sample_probability: parse_env(
                &lookup,
                "TOKENIZER_ROTATION_SAMPLE_PROBABILITY",
                DEFAULT_ROTATION_SAMPLE_PROBABILITY,
            )?,
            max_resolve_attempts: parse_env(
                &lookup,
                "TOKENIZER_MAX_RESOLVE_ATTEMPTS",
                DEFAULT_MAX_RESOLVE_ATTEMPTS,
            )?,
            secret_source,
        };
        lifecycle.validate()?;

        let store = StoreSettings {
            uri: lookup("TOKENIZER_MONGODB_URI")
                .unwrap_or_else(|| "mongodb://localhost:27017".to_string()),
            database: lookup("TOKENIZER_MONGODB_DATABASE").unwrap_or_else(|| "tokenizer".to_string()),
            collection: lookup("TOKENIZER_MONGODB_COLLECTION")
                .unwrap_or_else(|| crate::storage::TOKENIZER_COLLECTION.to_string()),
        };

        Ok(Self {
            kms,
            lifecycle,
            store,
        })
    }
}

/// Parse a variable with a default value.
fn parse_env<T, F>(lookup: &F, name: &str, default: T) -> Result<T, TokenizerError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(val) => val
            .trim()
            .parse()
            .map_err(|e| TokenizerError::config(format!("Invalid {name}: {e}"))),
        None => Ok(default),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
