//! Generic key-custody trait.
//!
//! The tokenizer core only ever talks to the remote service through this
//! trait, so the HTTP client and in-memory doubles are interchangeable.

use crate::error::KmsResult;
use crate::models::{KeyDescription, KeystoreConfig, KeystoreDescriptor};
use crate::signer::InvocationSigner;
use async_trait::async_trait;

/// Remote key-custody operations.
#[async_trait]
pub trait KeyCustody: Send + Sync {
    /// Create a keystore controlled by `config.controller`.
    async fn create_keystore(&self, config: &KeystoreConfig) -> KmsResult<KeystoreDescriptor>;

    /// Fetch a keystore by id.
    async fn get_keystore(
        &self,
        id: &str,
        signer: &dyn InvocationSigner,
    ) -> KmsResult<KeystoreDescriptor>;

    /// Generate a key of the named suite under a keystore.
    async fn generate_key(
        &self,
        keystore_id: &str,
        key_type: &str,
        signer: &dyn InvocationSigner,
    ) -> KmsResult<KeyDescription>;

    /// Sign data with a key.
    async fn sign(
        &self,
        key_id: &str,
        data: &[u8],
        signer: &dyn InvocationSigner,
    ) -> KmsResult<Vec<u8>>;

    /// Verify a signature with a key.
    async fn verify(
        &self,
        key_id: &str,
        data: &[u8],
        signature: &[u8],
        signer: &dyn InvocationSigner,
    ) -> KmsResult<bool>;

    /// Wrap key material with a key-encryption key.
    async fn wrap_key(
        &self,
        key_id: &str,
        unwrapped: &[u8],
        signer: &dyn InvocationSigner,
    ) -> KmsResult<Vec<u8>>;

    /// Unwrap key material with a key-encryption key.
    async fn unwrap_key(
        &self,
        key_id: &str,
        wrapped: &[u8],
        signer: &dyn InvocationSigner,
    ) -> KmsResult<Vec<u8>>;

    /// Derive a shared secret with a key-agreement key.
    async fn derive_secret(
        &self,
        key_id: &str,
        public_key: &[u8],
        signer: &dyn InvocationSigner,
    ) -> KmsResult<Vec<u8>>;
}
