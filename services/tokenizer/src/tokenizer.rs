//! Resolved tokenizer.

use crate::derivation::SignOperations;
use crate::error::TokenizerError;
use std::fmt;
use std::sync::Arc;

/// A usable tokenizer: its id plus digesting sign/verify operations.
#[derive(Clone)]
pub struct Tokenizer {
    id: String,
    hmac: Arc<dyn SignOperations>,
}

impl Tokenizer {
    pub fn new(id: impl Into<String>, hmac: Arc<dyn SignOperations>) -> Self {
        Self {
            id: id.into(),
            hmac,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Sign/verify operations; inputs are hashed locally first.
    #[must_use]
    pub fn hmac(&self) -> &Arc<dyn SignOperations> {
        &self.hmac
    }

    /// Derive the token for a sensitive value.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote signing call fails.
    pub async fn tokenize(&self, value: &[u8]) -> Result<Vec<u8>, TokenizerError> {
        self.hmac.sign(value).await
    }

    /// Check a previously issued token against a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote verification call fails.
    pub async fn verify_token(&self, value: &[u8], token: &[u8]) -> Result<bool, TokenizerError> {
        self.hmac.verify(value, token).await
    }
}

impl fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tokenizer")
            .field("id", &self.id)
            .field("key_id", &self.hmac.key_id())
            .finish()
    }
}
