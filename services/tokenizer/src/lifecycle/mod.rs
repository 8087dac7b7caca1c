//! Tokenizer lifecycle coordination.
//!
//! Drives records through `pending -> ready -> current -> deprecated` across
//! uncoordinated processes that share one document store.

pub mod cache;
pub mod coordinator;
pub mod rotation;

pub use cache::TokenizerCache;
pub use coordinator::LifecycleCoordinator;
pub use rotation::{RotationPolicy, RotationSampler};
