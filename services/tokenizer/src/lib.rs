//! Tokenizer Service library.
//!
//! Issues deterministic pseudonymization tokens through keys held by a
//! remote key-custody service, and coordinates the single current
//! tokenizer across service instances sharing one document store.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod derivation;
pub mod error;
pub mod identity;
pub mod kms;
pub mod lifecycle;
pub mod metrics;
pub mod storage;
pub mod tokenizer;

// Re-exports for convenience
pub use config::Config;
pub use error::TokenizerError;
pub use lifecycle::LifecycleCoordinator;
pub use tokenizer::Tokenizer;
