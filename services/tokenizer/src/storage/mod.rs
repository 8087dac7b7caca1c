//! Tokenizer record persistence.
//!
//! Every mutation is a single-document conditional update; the store's
//! uniqueness constraints on `tokenizer.id` and on the presence of
//! `tokenizer.current` are the only cross-process synchronization.

pub mod memory;
pub mod mongo;
pub mod record;

pub use memory::MemoryTokenizerStore;
pub use mongo::MongoTokenizerStore;
pub use record::{HmacRef, RecordMeta, TokenizerDoc, TokenizerRecord, TokenizerState};

use crate::error::TokenizerError;
use async_trait::async_trait;

/// Default collection name.
pub const TOKENIZER_COLLECTION: &str = "tokenizer-tokenizer";

/// Persistence of tokenizer lifecycle records.
#[async_trait]
pub trait TokenizerStore: Send + Sync {
    /// Create the id, state and partial current indexes.
    async fn ensure_indexes(&self) -> Result<(), TokenizerError>;

    /// Insert a new record.
    ///
    /// Fails with `Duplicate` if a record with the same id exists.
    async fn insert(&self, record: &TokenizerRecord) -> Result<(), TokenizerError>;

    /// Look up a record by tokenizer id.
    async fn find_by_id(&self, id: &str) -> Result<Option<TokenizerRecord>, TokenizerError>;

    /// Look up the record marked current.
    async fn find_current(&self) -> Result<Option<TokenizerRecord>, TokenizerError>;

    /// `pending -> ready` for `id`, attaching keystore and hmac key.
    ///
    /// Fails with `InvalidState` if the record is no longer pending.
    async fn add_keystore_and_hmac(
        &self,
        id: &str,
        keystore: &str,
        hmac: &HmacRef,
    ) -> Result<(), TokenizerError>;

    /// `ready -> current` for any one ready record.
    ///
    /// Returns `false` when no record is ready. Fails with `Duplicate` when
    /// another record already holds the current slot.
    async fn mark_ready_as_current(&self) -> Result<bool, TokenizerError>;

    /// `current -> deprecated`, removing the `current` field.
    ///
    /// Returns `true` if a record was deprecated.
    async fn deprecate_current(&self) -> Result<bool, TokenizerError>;
}
