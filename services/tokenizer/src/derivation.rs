//! Token derivation adapter.
//!
//! Wraps a remote signing handle so the key-custody service only ever
//! receives a SHA-256 digest of the caller's input, never the raw value or
//! its length.

use crate::error::TokenizerError;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Length of the digest forwarded to the wrapped operation.
pub const DIGEST_LEN: usize = 32;

/// Sign/verify capability of a tokenizer.
#[async_trait]
pub trait SignOperations: Send + Sync {
    /// Id of the key performing the operations.
    fn key_id(&self) -> &str;

    /// Sign data.
    async fn sign(&self, data: &[u8]) -> Result<Vec<u8>, TokenizerError>;

    /// Verify a signature over data.
    async fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool, TokenizerError>;
}

/// Pre-hashes every input before delegating.
#[derive(Debug, Clone)]
pub struct DigestingSigner<S> {
    inner: S,
}

impl<S: SignOperations> DigestingSigner<S> {
    pub const fn new(inner: S) -> Self {
        Self { inner }
    }

    pub const fn inner(&self) -> &S {
        &self.inner
    }
}

fn digest(data: &[u8]) -> [u8; DIGEST_LEN] {
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

#[async_trait]
impl<S: SignOperations> SignOperations for DigestingSigner<S> {
    fn key_id(&self) -> &str {
        self.inner.key_id()
    }

    async fn sign(&self, data: &[u8]) -> Result<Vec<u8>, TokenizerError> {
        self.inner.sign(&digest(data)).await
    }

    async fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool, TokenizerError> {
        self.inner.verify(&digest(data), signature).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Mutex;

    /// Records what reaches the remote side.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl SignOperations for Recorder {
        fn key_id(&self) -> &str {
            "recorder"
        }

        async fn sign(&self, data: &[u8]) -> Result<Vec<u8>, TokenizerError> {
            self.seen.lock().unwrap().push(data.to_vec());
            Ok(data.iter().rev().copied().collect())
        }

        async fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool, TokenizerError> {
            self.seen.lock().unwrap().push(data.to_vec());
            Ok(data.iter().rev().copied().eq(signature.iter().copied()))
        }
    }

    #[tokio::test]
    async fn test_sign_forwards_digest() {
        let adapter = DigestingSigner::new(Recorder::default());
        adapter.sign(b"123-45-6789").await.unwrap();

        let seen = adapter.inner().seen.lock().unwrap().clone();
        assert_eq!(seen, vec![Sha256::digest(b"123-45-6789").to_vec()]);
    }

    #[tokio::test]
    async fn test_sign_verify_agree() {
        let adapter = DigestingSigner::new(Recorder::default());
        let sig = adapter.sign(b"value").await.unwrap();
        assert!(adapter.verify(b"value", &sig).await.unwrap());
        assert!(!adapter.verify(b"other", &sig).await.unwrap());
        assert_eq!(adapter.key_id(), "recorder");
    }

    proptest! {
        #[test]
        fn prop_only_digests_reach_inner(data in prop::collection::vec(any::<u8>(), 0..512)) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let adapter = DigestingSigner::new(Recorder::default());

            rt.block_on(async {
                let sig = adapter.sign(&data).await.unwrap();
                adapter.verify(&data, &sig).await.unwrap();
            });

            let seen = adapter.inner().seen.lock().unwrap().clone();
            prop_assert_eq!(seen.len(), 2);
            for payload in seen {
                prop_assert_eq!(payload.len(), DIGEST_LEN);
                prop_assert!(data.len() <= DIGEST_LEN || payload != data);
            }
        }
    }
}
