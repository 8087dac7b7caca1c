//! WebKMS client configuration.

use std::time::Duration;

/// WebKMS client configuration.
#[derive(Debug, Clone)]
pub struct WebKmsConfig {
    /// Base URL of the key-custody service (keystores are created under it)
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for WebKmsConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: "auth-platform-tokenizer/1.0".to_string(),
        }
    }
}

impl WebKmsConfig {
    /// Create a new configuration.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set connection timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the base URL is missing or not http(s).
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigValidationError::MissingBaseUrl);
        }
        if !(self.base_url.starts_with("https://") || self.base_url.starts_with("http://")) {
            return Err(ConfigValidationError::InvalidBaseUrl(self.base_url.clone()));
        }
        if self.timeout.is_zero() {
            return Err(ConfigValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("KMS base URL is required")]
    MissingBaseUrl,

    #[error("KMS base URL must be http(s): {0}")]
    InvalidBaseUrl(String),

    #[error("KMS request timeout must be greater than 0")]
    InvalidTimeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WebKmsConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(matches!(config.validate(), Err(ConfigValidationError::MissingBaseUrl)));
    }

    #[test]
    fn test_base_trims_trailing_slash() {
        let config = WebKmsConfig::new("https://kms.example.com/kms/");
        assert_eq!(config.base(), "https://kms.example.com/kms");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_http() {
        let config = WebKmsConfig::new("ftp://kms.example.com");
        assert!(matches!(config.validate(), Err(ConfigValidationError::InvalidBaseUrl(_))));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = WebKmsConfig::new("https://kms.example.com").with_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(ConfigValidationError::InvalidTimeout)));
    }
}
