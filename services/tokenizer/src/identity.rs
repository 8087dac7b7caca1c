//! Secret-derived capability agents.
//!
//! A capability agent is the Ed25519 identity a tokenizer uses to
//! authenticate to the key-custody service. It is a pure function of
//! `(handle, secret)`, so any process holding the record can rebuild it.

use crate::error::TokenizerError;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use ring::hkdf;
use ring::signature::{Ed25519KeyPair, KeyPair};
use std::fmt;
use webkms_client::InvocationSigner;
use zeroize::Zeroizing;

/// Handle used for identities backed by a per-tokenizer secret.
pub const PRIMARY_HANDLE: &str = "primary";

/// Size of freshly generated tokenizer secrets.
pub const SECRET_LEN: usize = 32;

const HKDF_INFO: &[u8] = b"capability-agent";

// multicodec prefix for ed25519-pub
const ED25519_MULTICODEC: [u8; 2] = [0xed, 0x01];

/// Application-wide secret, zeroized on drop.
#[derive(Clone)]
pub struct AppSecret(Zeroizing<Vec<u8>>);

impl AppSecret {
    /// Wrap raw secret bytes.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the secret is empty.
    pub fn new(bytes: Vec<u8>) -> Result<Self, TokenizerError> {
        if bytes.is_empty() {
            return Err(TokenizerError::config("Application secret is empty"));
        }
        Ok(Self(Zeroizing::new(bytes)))
    }

    /// Decode a base64url (unpadded) secret.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if decoding fails or the result is empty.
    pub fn from_base64url(encoded: &str) -> Result<Self, TokenizerError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim().trim_end_matches('='))
            .map_err(|e| TokenizerError::config(format!("Invalid application secret: {e}")))?;
        Self::new(bytes)
    }

    fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for AppSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AppSecret([REDACTED])")
    }
}

/// Where tokenizer identities get their secret material.
#[derive(Debug, Clone)]
pub enum SecretSource {
    /// Fresh random secret per tokenizer, persisted in its record
    PerTokenizer,
    /// One application secret shared by every tokenizer
    Application(AppSecret),
}

/// Secret material needed to rebuild one tokenizer identity.
pub struct IdentitySeed {
    /// Derivation handle
    pub handle: String,
    /// Secret to persist with the record, if any
    pub persisted_secret: Option<Zeroizing<Vec<u8>>>,
}

impl SecretSource {
    /// Produce material for a brand new identity.
    #[must_use]
    pub fn fresh(&self) -> IdentitySeed {
        let mut rng = rand::thread_rng();
        match self {
            Self::PerTokenizer => {
                let mut secret = Zeroizing::new(vec![0u8; SECRET_LEN]);
                rng.fill_bytes(&mut secret);
                IdentitySeed {
                    handle: PRIMARY_HANDLE.to_string(),
                    persisted_secret: Some(secret),
                }
            }
            Self::Application(_) => {
                let mut raw = [0u8; 16];
                rng.fill_bytes(&mut raw);
                IdentitySeed {
                    handle: URL_SAFE_NO_PAD.encode(raw),
                    persisted_secret: None,
                }
            }
        }
    }

    /// Rebuild the capability agent for a stored identity.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the record carries no secret and no
    /// application secret is configured.
    pub fn restore(
        &self,
        handle: &str,
        stored_secret: Option<&[u8]>,
    ) -> Result<CapabilityAgent, TokenizerError> {
        match (stored_secret, self) {
            (Some(secret), _) => CapabilityAgent::from_secret(handle, secret),
            (None, Self::Application(app)) => CapabilityAgent::from_secret(handle, app.expose()),
            (None, Self::PerTokenizer) => Err(TokenizerError::config(
                "Tokenizer record has no secret and no application secret is configured",
            )),
        }
    }

    /// Derive the agent for freshly generated material.
    ///
    /// # Errors
    ///
    /// Returns an error if derivation fails.
    pub fn derive(&self, seed: &IdentitySeed) -> Result<CapabilityAgent, TokenizerError> {
        self.restore(&seed.handle, seed.persisted_secret.as_deref().map(Vec::as_slice))
    }
}

/// Ed25519 signing identity derived from a secret.
pub struct CapabilityAgent {
    id: String,
    handle: String,
    fingerprint: String,
    key_pair: Ed25519KeyPair,
}

impl CapabilityAgent {
    /// Deterministically derive an agent from `(handle, secret)`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty secret.
    pub fn from_secret(handle: &str, secret: &[u8]) -> Result<Self, TokenizerError> {
        if secret.is_empty() {
            return Err(TokenizerError::config("Capability agent secret is empty"));
        }

        let seed = derive_seed(handle, secret)?;
        let key_pair = Ed25519KeyPair::from_seed_unchecked(&*seed)
            .map_err(|e| TokenizerError::config(format!("Invalid Ed25519 seed: {e}")))?;

        let mut multikey = Vec::with_capacity(ED25519_MULTICODEC.len() + 32);
        multikey.extend_from_slice(&ED25519_MULTICODEC);
        multikey.extend_from_slice(key_pair.public_key().as_ref());
        let fingerprint = format!("z{}", bs58::encode(multikey).into_string());

        Ok(Self {
            id: format!("did:key:{fingerprint}"),
            handle: handle.to_string(),
            fingerprint,
            key_pair,
        })
    }

    /// Public identifier (`did:key:z...`).
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Derivation handle.
    #[must_use]
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Raw public key bytes.
    #[must_use]
    pub fn public_key(&self) -> &[u8] {
        self.key_pair.public_key().as_ref()
    }
}

impl fmt::Debug for CapabilityAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityAgent")
            .field("id", &self.id)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl InvocationSigner for CapabilityAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn verification_method(&self) -> String {
        format!("{}#{}", self.id, self.fingerprint)
    }

    fn sign(&self, data: &[u8]) -> Vec<u8> {
        self.key_pair.sign(data).as_ref().to_vec()
    }
}

fn derive_seed(handle: &str, secret: &[u8]) -> Result<Zeroizing<[u8; 32]>, TokenizerError> {
    let salt = hkdf::Salt::new(hkdf::HKDF_SHA256, handle.as_bytes());
    let prk = salt.extract(secret);
    let info = [HKDF_INFO];
    let okm = prk
        .expand(&info, hkdf::HKDF_SHA256)
        .map_err(|_| TokenizerError::config("HKDF expansion failed"))?;

    let mut seed = Zeroizing::new([0u8; 32]);
    okm.fill(&mut *seed)
        .map_err(|_| TokenizerError::config("HKDF output length mismatch"))?;
    Ok(seed)
}
