//! Typed handles to keys held by the key-custody service.
//!
//! Every handle carries the custody client and the capability agent that
//! authorizes its invocations. Only the operations valid for a suite are
//! exposed on its handle.

use super::key_type::KeyType;
use crate::derivation::SignOperations;
use crate::error::TokenizerError;
use crate::identity::CapabilityAgent;
use crate::metrics::KMS_OPERATION_LATENCY;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;
use webkms_client::KeyCustody;

#[derive(Clone)]
struct KeyContext {
    custody: Arc<dyn KeyCustody>,
    agent: Arc<CapabilityAgent>,
    key_id: String,
}

impl KeyContext {
    fn observe(operation: &str, started: Instant) {
        KMS_OPERATION_LATENCY
            .with_label_values(&[operation])
            .observe(started.elapsed().as_secs_f64());
    }
}

impl fmt::Debug for KeyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyContext")
            .field("key_id", &self.key_id)
            .field("controller", &self.agent.id())
            .finish_non_exhaustive()
    }
}

/// HMAC-SHA256 key.
#[derive(Debug, Clone)]
pub struct HmacKey(KeyContext);

impl HmacKey {
    /// Remote key id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.0.key_id
    }
}

#[async_trait]
impl SignOperations for HmacKey {
    fn key_id(&self) -> &str {
        &self.0.key_id
    }

    #[instrument(skip(self, data), fields(key_id = %self.0.key_id))]
    async fn sign(&self, data: &[u8]) -> Result<Vec<u8>, TokenizerError> {
        let started = Instant::now();
        let result = self
            .0
            .custody
            .sign(&self.0.key_id, data, self.0.agent.as_ref())
            .await;
        KeyContext::observe("sign", started);
        Ok(result?)
    }

    #[instrument(skip(self, data, signature), fields(key_id = %self.0.key_id))]
    async fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool, TokenizerError> {
        let started = Instant::now();
        let result = self
            .0
            .custody
            .verify(&self.0.key_id, data, signature, self.0.agent.as_ref())
            .await;
        KeyContext::observe("verify", started);
        Ok(result?)
    }
}

/// Key-encryption key.
#[derive(Debug, Clone)]
pub struct Kek(KeyContext);

impl Kek {
    /// Remote key id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.0.key_id
    }

    /// Wrap key material.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote operation fails.
    pub async fn wrap_key(&self, unwrapped: &[u8]) -> Result<Vec<u8>, TokenizerError> {
        let started = Instant::now();
        let result = self
            .0
            .custody
            .wrap_key(&self.0.key_id, unwrapped, self.0.agent.as_ref())
            .await;
        KeyContext::observe("wrap", started);
        Ok(result?)
    }

    /// Unwrap key material.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote operation fails.
    pub async fn unwrap_key(&self, wrapped: &[u8]) -> Result<Vec<u8>, TokenizerError> {
        let started = Instant::now();
        let result = self
            .0
            .custody
            .unwrap_key(&self.0.key_id, wrapped, self.0.agent.as_ref())
            .await;
        KeyContext::observe("unwrap", started);
        Ok(result?)
    }
}

/// Asymmetric signing key.
#[derive(Debug, Clone)]
pub struct AsymmetricKey(KeyContext);

impl AsymmetricKey {
    /// Remote key id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.0.key_id
    }

    /// Sign data remotely.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote operation fails.
    pub async fn sign(&self, data: &[u8]) -> Result<Vec<u8>, TokenizerError> {
        let started = Instant::now();
        let result = self
            .0
            .custody
            .sign(&self.0.key_id, data, self.0.agent.as_ref())
            .await;
        KeyContext::observe("sign", started);
        Ok(result?)
    }
}

/// Key-agreement key.
#[derive(Debug, Clone)]
pub struct KeyAgreementKey(KeyContext);

impl KeyAgreementKey {
    /// Remote key id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.0.key_id
    }

    /// Derive a shared secret with a peer public key.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote operation fails.
    pub async fn derive_secret(&self, public_key: &[u8]) -> Result<Vec<u8>, TokenizerError> {
        let started = Instant::now();
        let result = self
            .0
            .custody
            .derive_secret(&self.0.key_id, public_key, self.0.agent.as_ref())
            .await;
        KeyContext::observe("derive_secret", started);
        Ok(result?)
    }
}

/// A key handle of one of the supported suites.
#[derive(Debug, Clone)]
pub enum KeyHandle {
    /// Symmetric signing
    Hmac(HmacKey),
    /// Symmetric wrapping
    Kek(Kek),
    /// Asymmetric signing
    Asymmetric(AsymmetricKey),
    /// Key agreement
    KeyAgreement(KeyAgreementKey),
}

impl KeyHandle {
    /// Build the handle variant matching `key_type`.
    #[must_use]
    pub fn new(
        key_type: KeyType,
        key_id: impl Into<String>,
        custody: Arc<dyn KeyCustody>,
        agent: Arc<CapabilityAgent>,
    ) -> Self {
        let ctx = KeyContext {
            custody,
            agent,
            key_id: key_id.into(),
        };
        match key_type {
            KeyType::Hmac => Self::Hmac(HmacKey(ctx)),
            KeyType::Kek => Self::Kek(Kek(ctx)),
            KeyType::Asymmetric => Self::Asymmetric(AsymmetricKey(ctx)),
            KeyType::KeyAgreement => Self::KeyAgreement(KeyAgreementKey(ctx)),
        }
    }

    /// Suite of this handle.
    #[must_use]
    pub const fn key_type(&self) -> KeyType {
        match self {
            Self::Hmac(_) => KeyType::Hmac,
            Self::Kek(_) => KeyType::Kek,
            Self::Asymmetric(_) => KeyType::Asymmetric,
            Self::KeyAgreement(_) => KeyType::KeyAgreement,
        }
    }

    /// Remote key id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Hmac(k) => k.id(),
            Self::Kek(k) => k.id(),
            Self::Asymmetric(k) => k.id(),
            Self::KeyAgreement(k) => k.id(),
        }
    }

    /// Narrow to an HMAC handle.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedKeyType` for any other suite.
    pub fn into_hmac(self) -> Result<HmacKey, TokenizerError> {
        match self {
            Self::Hmac(key) => Ok(key),
            other => Err(TokenizerError::UnsupportedKeyType(format!(
                "expected {}, got {}",
                KeyType::Hmac,
                other.key_type()
            ))),
        }
    }
}
