//! Tokenizer lifecycle record.

use crate::error::TokenizerError;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

/// Lifecycle state of a tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenizerState {
    /// Created, keystore not yet provisioned
    Pending,
    /// Provisioned, waiting for promotion
    Ready,
    /// The single tokenizer used for new tokens
    Current,
    /// Retired, kept to verify previously issued tokens
    Deprecated,
}

impl TokenizerState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Current => "current",
            Self::Deprecated => "deprecated",
        }
    }
}

impl fmt::Display for TokenizerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to the remote HMAC key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HmacRef {
    pub id: String,
    #[serde(rename = "type")]
    pub key_type: String,
}

/// Record timestamps, epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    pub created: i64,
    pub updated: i64,
}

/// Tokenizer fields of a record.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizerDoc {
    /// Capability agent id
    pub id: String,
    /// Identity derivation handle
    pub handle: String,
    /// base64url secret; absent when an application secret is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    pub state: TokenizerState,
    /// Present only while `state` is current
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keystore: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmac: Option<HmacRef>,
}

impl fmt::Debug for TokenizerDoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenizerDoc")
            .field("id", &self.id)
            .field("handle", &self.handle)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("state", &self.state)
            .field("current", &self.current)
            .field("keystore", &self.keystore)
            .field("hmac", &self.hmac)
            .finish()
    }
}

/// One document per tokenizer identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizerRecord {
    pub meta: RecordMeta,
    pub tokenizer: TokenizerDoc,
}

impl TokenizerRecord {
    /// New record in `pending`.
    #[must_use]
    pub fn pending(id: impl Into<String>, handle: impl Into<String>, secret: Option<&[u8]>) -> Self {
        let now = now_millis();
        Self {
            meta: RecordMeta {
                created: now,
                updated: now,
            },
            tokenizer: TokenizerDoc {
                id: id.into(),
                handle: handle.into(),
                secret: secret.map(|s| URL_SAFE_NO_PAD.encode(s)),
                state: TokenizerState::Pending,
                current: None,
                keystore: None,
                hmac: None,
            },
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.tokenizer.id
    }

    #[must_use]
    pub const fn state(&self) -> TokenizerState {
        self.tokenizer.state
    }

    /// Decode the stored secret.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the stored value is not valid base64url.
    pub fn decode_secret(&self) -> Result<Option<Zeroizing<Vec<u8>>>, TokenizerError> {
        self.tokenizer
            .secret
            .as_deref()
            .map(|encoded| {
                URL_SAFE_NO_PAD
                    .decode(encoded)
                    .map(Zeroizing::new)
                    .map_err(|e| {
                        TokenizerError::invalid_state(format!(
                            "Tokenizer {} has a corrupt secret: {e}",
                            self.tokenizer.id
                        ))
                    })
            })
            .transpose()
    }

    /// Keystore and HMAC key, once provisioned.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` for records that cannot back a tokenizer.
    pub fn provisioned_keys(&self) -> Result<(&str, &HmacRef), TokenizerError> {
        if self.tokenizer.state == TokenizerState::Pending {
            return Err(TokenizerError::invalid_state(format!(
                "Tokenizer {} is still pending",
                self.tokenizer.id
            )));
        }
        match (&self.tokenizer.keystore, &self.tokenizer.hmac) {
            (Some(keystore), Some(hmac)) => Ok((keystore, hmac)),
            _ => Err(TokenizerError::invalid_state(format!(
                "Tokenizer {} is missing its keystore or hmac key",
                self.tokenizer.id
            ))),
        }
    }
}

#[must_use]
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
