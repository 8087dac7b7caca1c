//! In-memory key-custody service for tests and local runs.

use async_trait::async_trait;
use ring::hmac;
use ring::signature::Ed25519KeyPair;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;
use webkms_client::{
    InvocationSigner, KeyCustody, KeyDescription, KmsError, KmsResult, KeystoreConfig,
    KeystoreDescriptor,
};

use super::key_type::KeyType;

const MOCK_BASE_URL: &str = "https://kms.mock/kms";

struct MockKey {
    keystore_id: String,
    key_type: KeyType,
    secret: [u8; 32],
}

#[derive(Default)]
struct MockState {
    keystores: HashMap<String, KeystoreDescriptor>,
    keys: HashMap<String, MockKey>,
    signed_payloads: Vec<Vec<u8>>,
}

/// Key-custody double backed by process memory.
///
/// HMAC keys compute real HMAC-SHA256 so tokens are deterministic per key.
/// Key operations are only authorized for the keystore's controller.
#[derive(Default)]
pub struct MockKms {
    state: RwLock<MockState>,
    deny: AtomicBool,
}

impl MockKms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every subsequent request with a permission error.
    pub fn deny_all(&self, deny: bool) {
        self.deny.store(deny, Ordering::SeqCst);
    }

    pub async fn keystore_count(&self) -> usize {
        self.state.read().await.keystores.len()
    }

    pub async fn key_count(&self) -> usize {
        self.state.read().await.keys.len()
    }

    /// Every payload passed to a sign or verify call, in order.
    pub async fn signed_payloads(&self) -> Vec<Vec<u8>> {
        self.state.read().await.signed_payloads.clone()
    }

    fn check_allowed(&self) -> KmsResult<()> {
        if self.deny.load(Ordering::SeqCst) {
            return Err(KmsError::permission_denied("Request rejected by policy"));
        }
        Ok(())
    }

    fn authorize(
        state: &MockState,
        key_id: &str,
        signer: &dyn InvocationSigner,
        expected: &[KeyType],
    ) -> KmsResult<[u8; 32]> {
        let key = state
            .keys
            .get(key_id)
            .ok_or_else(|| KmsError::not_found(format!("Key {key_id}")))?;
        let keystore = state
            .keystores
            .get(&key.keystore_id)
            .ok_or_else(|| KmsError::not_found(format!("Keystore {}", key.keystore_id)))?;
        if keystore.controller != signer.id() {
            return Err(KmsError::permission_denied(format!(
                "{} does not control {}",
                signer.id(),
                keystore.id
            )));
        }
        if !expected.contains(&key.key_type) {
            return Err(KmsError::operation(format!(
                "Operation not supported by {}",
                key.key_type
            )));
        }
        Ok(key.secret)
    }
}

fn keystream_xor(secret: &[u8; 32], data: &[u8]) -> Vec<u8> {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret);
    let pad = hmac::sign(&key, b"wrap");
    data.iter()
        .zip(pad.as_ref().iter().cycle())
        .map(|(b, p)| b ^ p)
        .collect()
}

#[async_trait]
impl KeyCustody for MockKms {
    async fn create_keystore(&self, config: &KeystoreConfig) -> KmsResult<KeystoreDescriptor> {
        self.check_allowed()?;
        let descriptor = KeystoreDescriptor {
            id: format!("{MOCK_BASE_URL}/keystores/{}", Uuid::new_v4()),
            sequence: config.sequence,
            controller: config.controller.clone(),
            reference_id: config.reference_id.clone(),
            kms_module: config.kms_module.clone(),
            meter_id: config.meter_id.clone(),
            ip_allow_list: config.ip_allow_list.clone(),
        };
        self.state
            .write()
            .await
            .keystores
            .insert(descriptor.id.clone(), descriptor.clone());
        Ok(descriptor)
    }

    async fn get_keystore(
        &self,
        id: &str,
        signer: &dyn InvocationSigner,
    ) -> KmsResult<KeystoreDescriptor> {
        self.check_allowed()?;
        let state = self.state.read().await;
        let keystore = state
            .keystores
            .get(id)
            .ok_or_else(|| KmsError::not_found(format!("Keystore {id}")))?;
        if keystore.controller != signer.id() {
            return Err(KmsError::permission_denied("Not the keystore controller"));
        }
        Ok(keystore.clone())
    }

    async fn generate_key(
        &self,
        keystore_id: &str,
        key_type: &str,
        signer: &dyn InvocationSigner,
    ) -> KmsResult<KeyDescription> {
        self.check_allowed()?;
        let key_type = KeyType::parse(key_type).map_err(|e| KmsError::operation(e.to_string()))?;

        let mut state = self.state.write().await;
        let keystore = state
            .keystores
            .get(keystore_id)
            .ok_or_else(|| KmsError::not_found(format!("Keystore {keystore_id}")))?;
        if keystore.controller != signer.id() {
            return Err(KmsError::permission_denied("Not the keystore controller"));
        }

        let mut secret = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut secret);
        let id = format!("{keystore_id}/keys/{}", Uuid::new_v4());
        state.keys.insert(
            id.clone(),
            MockKey {
                keystore_id: keystore_id.to_string(),
                key_type,
                secret,
            },
        );

        Ok(KeyDescription {
            id,
            key_type: key_type.suite().to_string(),
        })
    }

    async fn sign(
        &self,
        key_id: &str,
        data: &[u8],
        signer: &dyn InvocationSigner,
    ) -> KmsResult<Vec<u8>> {
        self.check_allowed()?;
        let mut state = self.state.write().await;
        let secret = Self::authorize(
            &state,
            key_id,
            signer,
            &[KeyType::Hmac, KeyType::Asymmetric],
        )?;
        state.signed_payloads.push(data.to_vec());

        if state.keys.get(key_id).map(|k| k.key_type) == Some(KeyType::Asymmetric) {
            let pair = Ed25519KeyPair::from_seed_unchecked(&secret)
                .map_err(|e| KmsError::operation(e.to_string()))?;
            return Ok(pair.sign(data).as_ref().to_vec());
        }

        let key = hmac::Key::new(hmac::HMAC_SHA256, &secret);
        Ok(hmac::sign(&key, data).as_ref().to_vec())
    }

    async fn verify(
        &self,
        key_id: &str,
        data: &[u8],
        signature: &[u8],
        signer: &dyn InvocationSigner,
    ) -> KmsResult<bool> {
        self.check_allowed()?;
        let mut state = self.state.write().await;
        let secret = Self::authorize(&state, key_id, signer, &[KeyType::Hmac])?;
        state.signed_payloads.push(data.to_vec());

        let key = hmac::Key::new(hmac::HMAC_SHA256, &secret);
        Ok(hmac::verify(&key, data, signature).is_ok())
    }

    async fn wrap_key(
        &self,
        key_id: &str,
        unwrapped: &[u8],
        signer: &dyn InvocationSigner,
    ) -> KmsResult<Vec<u8>> {
        self.check_allowed()?;
        let state = self.state.read().await;
        let secret = Self::authorize(&state, key_id, signer, &[KeyType::Kek])?;
        Ok(keystream_xor(&secret, unwrapped))
    }

    async fn unwrap_key(
        &self,
        key_id: &str,
        wrapped: &[u8],
        signer: &dyn InvocationSigner,
    ) -> KmsResult<Vec<u8>> {
        self.check_allowed()?;
        let state = self.state.read().await;
        let secret = Self::authorize(&state, key_id, signer, &[KeyType::Kek])?;
        Ok(keystream_xor(&secret, wrapped))
    }

    async fn derive_secret(
        &self,
        key_id: &str,
        public_key: &[u8],
        signer: &dyn InvocationSigner,
    ) -> KmsResult<Vec<u8>> {
        self.check_allowed()?;
        let state = self.state.read().await;
        let secret = Self::authorize(&state, key_id, signer, &[KeyType::KeyAgreement])?;
        let key = hmac::Key::new(hmac::HMAC_SHA256, &secret);
        Ok(hmac::sign(&key, public_key).as_ref().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{CapabilityAgent, PRIMARY_HANDLE};

    async fn keystore_for(kms: &MockKms, agent: &CapabilityAgent) -> String {
        kms.create_keystore(&KeystoreConfig::new(agent.id(), "ssm-v1"))
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_hmac_is_deterministic() {
        let kms = MockKms::new();
        let agent = CapabilityAgent::from_secret(PRIMARY_HANDLE, b"a").unwrap();
        let keystore = keystore_for(&kms, &agent).await;
        let key = kms.generate_key(&keystore, "hmac", &agent).await.unwrap();

        let sig1 = kms.sign(&key.id, b"data", &agent).await.unwrap();
        let sig2 = kms.sign(&key.id, b"data", &agent).await.unwrap();
        let sig3 = kms.sign(&key.id, b"other", &agent).await.unwrap();

        assert_eq!(sig1, sig2);
        assert_ne!(sig1, sig3);
        assert_eq!(kms.signed_payloads().await.len(), 3);
    }

    #[tokio::test]
    async fn test_only_controller_may_invoke() {
        let kms = MockKms::new();
        let owner = CapabilityAgent::from_secret(PRIMARY_HANDLE, b"owner").unwrap();
        let intruder = CapabilityAgent::from_secret(PRIMARY_HANDLE, b"intruder").unwrap();
        let keystore = keystore_for(&kms, &owner).await;
        let key = kms.generate_key(&keystore, "hmac", &owner).await.unwrap();

        let result = kms.sign(&key.id, b"data", &intruder).await;
        assert!(matches!(result, Err(KmsError::PermissionDenied(_))));
        let result = kms.get_keystore(&keystore, &intruder).await;
        assert!(matches!(result, Err(KmsError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn test_unknown_key() {
        let kms = MockKms::new();
        let agent = CapabilityAgent::from_secret(PRIMARY_HANDLE, b"a").unwrap();
        let result = kms.sign("missing", b"data", &agent).await;
        assert!(matches!(result, Err(KmsError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_wrong_operation_for_suite() {
        let kms = MockKms::new();
        let agent = CapabilityAgent::from_secret(PRIMARY_HANDLE, b"a").unwrap();
        let keystore = keystore_for(&kms, &agent).await;
        let key = kms.generate_key(&keystore, "kek", &agent).await.unwrap();

        let result = kms.sign(&key.id, b"data", &agent).await;
        assert!(matches!(result, Err(KmsError::Operation(_))));
    }
}
