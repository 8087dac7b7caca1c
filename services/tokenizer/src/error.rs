use thiserror::Error;
use webkms_client::KmsError;

#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate tokenizer: {0}")]
    Duplicate(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("KMS operation error: {0}")]
    Operation(String),

    #[error("KMS permission error: {0}")]
    Permission(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error("Could not resolve current tokenizer after {attempts} attempts")]
    CoordinationTimeout { attempts: u32 },

    #[error("Database error: {0}")]
    Database(String),
}

impl TokenizerError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn duplicate(msg: impl Into<String>) -> Self {
        Self::Duplicate(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn operation(msg: impl Into<String>) -> Self {
        Self::Operation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Whether retrying the whole resolution may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::InvalidState(_) | Self::CoordinationTimeout { .. })
    }

    /// Stable code for surfacing to callers.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => TOKENIZER_NOT_FOUND,
            Self::Duplicate(_) => TOKENIZER_DUPLICATE,
            Self::InvalidState(_) => TOKENIZER_INVALID_STATE,
            Self::Operation(_) | Self::UnsupportedKeyType(_) => TOKENIZER_KMS_ERROR,
            Self::Permission(_) => TOKENIZER_KMS_PERMISSION,
            Self::Configuration(_) => TOKENIZER_CONFIG_ERROR,
            Self::CoordinationTimeout { .. } => TOKENIZER_COORDINATION_TIMEOUT,
            Self::Database(_) => TOKENIZER_DATABASE_ERROR,
        }
    }
}

impl From<KmsError> for TokenizerError {
    fn from(err: KmsError) -> Self {
        match err {
            KmsError::PermissionDenied(msg) => Self::Permission(msg),
            KmsError::NotFound(msg) => Self::NotFound(msg),
            KmsError::InvalidConfig(msg) => Self::Configuration(msg),
            other => Self::Operation(other.to_string()),
        }
    }
}

impl From<mongodb::error::Error> for TokenizerError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

// Error codes surfaced to callers
pub const TOKENIZER_NOT_FOUND: &str = "TOKENIZER_NOT_FOUND";
pub const TOKENIZER_DUPLICATE: &str = "TOKENIZER_DUPLICATE";
pub const TOKENIZER_INVALID_STATE: &str = "TOKENIZER_INVALID_STATE";
pub const TOKENIZER_KMS_ERROR: &str = "TOKENIZER_KMS_ERROR";
pub const TOKENIZER_KMS_PERMISSION: &str = "TOKENIZER_KMS_PERMISSION";
pub const TOKENIZER_CONFIG_ERROR: &str = "TOKENIZER_CONFIG_ERROR";
pub const TOKENIZER_COORDINATION_TIMEOUT: &str = "TOKENIZER_COORDINATION_TIMEOUT";
pub const TOKENIZER_DATABASE_ERROR: &str = "TOKENIZER_DATABASE_ERROR";
