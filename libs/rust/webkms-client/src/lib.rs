//! WebKMS client for Auth Platform.
//!
//! Provisions keystores and keys on a remote key-custody service and invokes
//! key operations on behalf of a locally held invocation signer.

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod provider;
pub mod signer;

pub use client::WebKmsClient;
pub use config::WebKmsConfig;
pub use error::{KmsError, KmsResult};
pub use models::{KeyDescription, KeystoreConfig, KeystoreDescriptor};
pub use provider::KeyCustody;
pub use signer::InvocationSigner;
