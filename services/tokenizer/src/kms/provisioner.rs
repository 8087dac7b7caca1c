//! Keystore and key provisioning.

use super::handle::KeyHandle;
use super::key_type::KeyType;
use crate::config::KmsSettings;
use crate::error::TokenizerError;
use crate::identity::CapabilityAgent;
use std::sync::Arc;
use tracing::{info, instrument};
use webkms_client::{KeyCustody, KeystoreConfig, KeystoreDescriptor};

/// Reference id given to tokenizer keystores.
pub const TOKENIZER_KEYSTORE_REFERENCE: &str = "primary";

/// Creates keystores and keys on the key-custody service.
///
/// Holds no state of its own; every call is a remote request.
#[derive(Clone)]
pub struct KeystoreProvisioner {
    custody: Arc<dyn KeyCustody>,
    settings: KmsSettings,
}

impl KeystoreProvisioner {
    /// Create a provisioner using `settings` for keystore defaults.
    #[must_use]
    pub fn new(custody: Arc<dyn KeyCustody>, settings: KmsSettings) -> Self {
        Self { custody, settings }
    }

    /// Underlying key-custody client.
    #[must_use]
    pub fn custody(&self) -> Arc<dyn KeyCustody> {
        Arc::clone(&self.custody)
    }

    /// Create a keystore.
    ///
    /// Without a `reference_id` every call creates a new remote keystore.
    ///
    /// # Errors
    ///
    /// Returns `Operation` or `Permission` errors from the remote service.
    #[instrument(skip(self, ip_allow_list))]
    pub async fn create_keystore(
        &self,
        controller: &str,
        kms_module: &str,
        meter_id: Option<String>,
        ip_allow_list: Option<Vec<String>>,
        reference_id: Option<&str>,
    ) -> Result<KeystoreDescriptor, TokenizerError> {
        let mut config = KeystoreConfig::new(controller, kms_module)
            .with_meter_id(meter_id)
            .with_ip_allow_list(ip_allow_list);
        if let Some(reference_id) = reference_id {
            config = config.with_reference_id(reference_id);
        }

        let keystore = self.custody.create_keystore(&config).await?;
        info!(keystore = %keystore.id, "Created keystore");
        Ok(keystore)
    }

    /// Create the keystore backing a tokenizer, controlled by its agent.
    ///
    /// # Errors
    ///
    /// Returns `Operation` or `Permission` errors from the remote service.
    pub async fn create_tokenizer_keystore(
        &self,
        agent: &CapabilityAgent,
    ) -> Result<KeystoreDescriptor, TokenizerError> {
        self.create_keystore(
            agent.id(),
            &self.settings.kms_module,
            self.settings.meter_id.clone(),
            self.settings.ip_allow_list.clone(),
            Some(TOKENIZER_KEYSTORE_REFERENCE),
        )
        .await
    }

    /// Fetch a keystore.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the keystore does not exist.
    #[instrument(skip(self, agent))]
    pub async fn get_keystore(
        &self,
        id: &str,
        agent: &CapabilityAgent,
    ) -> Result<KeystoreDescriptor, TokenizerError> {
        Ok(self.custody.get_keystore(id, agent).await?)
    }

    /// Generate a key of a named suite under a keystore.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedKeyType` for unknown suite names, before any
    /// remote call is made.
    #[instrument(skip(self, agent))]
    pub async fn generate_key(
        &self,
        keystore_id: &str,
        key_type: &str,
        agent: Arc<CapabilityAgent>,
    ) -> Result<KeyHandle, TokenizerError> {
        let key_type = KeyType::parse(key_type)?;
        let key = self
            .custody
            .generate_key(keystore_id, key_type.suite(), agent.as_ref())
            .await?;
        let key_type = KeyType::parse(&key.key_type)?;
        info!(key_id = %key.id, %key_type, "Generated key");
        Ok(KeyHandle::new(key_type, key.id, self.custody(), agent))
    }

    /// Rebuild a handle for a previously generated key.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedKeyType` for unknown suite names.
    pub fn key_handle(
        &self,
        key_id: &str,
        key_type: &str,
        agent: Arc<CapabilityAgent>,
    ) -> Result<KeyHandle, TokenizerError> {
        let key_type = KeyType::parse(key_type)?;
        Ok(KeyHandle::new(key_type, key_id, self.custody(), agent))
    }
}
