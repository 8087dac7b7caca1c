//! In-memory tokenizer store.
//!
//! Applies each operation under one write lock and enforces the same
//! uniqueness rules as the MongoDB indexes.

use super::record::{HmacRef, TokenizerRecord, TokenizerState, now_millis};
use super::TokenizerStore;
use crate::error::TokenizerError;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Tokenizer store backed by process memory, kept in insertion order.
#[derive(Debug, Default)]
pub struct MemoryTokenizerStore {
    records: RwLock<Vec<TokenizerRecord>>,
}

impl MemoryTokenizerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record.
    pub async fn records(&self) -> Vec<TokenizerRecord> {
        self.records.read().await.clone()
    }

    pub async fn count_in_state(&self, state: TokenizerState) -> usize {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.tokenizer.state == state)
            .count()
    }
}

#[async_trait]
impl TokenizerStore for MemoryTokenizerStore {
    async fn ensure_indexes(&self) -> Result<(), TokenizerError> {
        Ok(())
    }

    async fn insert(&self, record: &TokenizerRecord) -> Result<(), TokenizerError> {
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.tokenizer.id == record.tokenizer.id) {
            return Err(TokenizerError::duplicate(record.tokenizer.id.clone()));
        }
        if record.tokenizer.current.is_some() && records.iter().any(|r| r.tokenizer.current.is_some()) {
            return Err(TokenizerError::duplicate("current tokenizer"));
        }
        records.push(record.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<TokenizerRecord>, TokenizerError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|r| r.tokenizer.id == id)
            .cloned())
    }

    async fn find_current(&self) -> Result<Option<TokenizerRecord>, TokenizerError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|r| r.tokenizer.current == Some(true))
            .cloned())
    }

    async fn add_keystore_and_hmac(
        &self,
        id: &str,
        keystore: &str,
        hmac: &HmacRef,
    ) -> Result<(), TokenizerError> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.tokenizer.id == id && r.tokenizer.state == TokenizerState::Pending)
            .ok_or_else(|| {
                TokenizerError::invalid_state(format!("Tokenizer {id} is no longer pending"))
            })?;

        record.tokenizer.state = TokenizerState::Ready;
        record.tokenizer.keystore = Some(keystore.to_string());
        record.tokenizer.hmac = Some(hmac.clone());
        record.meta.updated = now_millis();
        Ok(())
    }

    async fn mark_ready_as_current(&self) -> Result<bool, TokenizerError> {
        let mut records = self.records.write().await;
        let Some(index) = records
            .iter()
            .position(|r| r.tokenizer.state == TokenizerState::Ready)
        else {
            return Ok(false);
        };
        if records.iter().any(|r| r.tokenizer.current.is_some()) {
            return Err(TokenizerError::duplicate("current tokenizer"));
        }

        let record = &mut records[index];
        record.tokenizer.state = TokenizerState::Current;
        record.tokenizer.current = Some(true);
        record.meta.updated = now_millis();
        Ok(true)
    }

    async fn deprecate_current(&self) -> Result<bool, TokenizerError> {
        let mut records = self.records.write().await;
        let Some(record) = records
            .iter_mut()
            .find(|r| r.tokenizer.state == TokenizerState::Current)
        else {
            return Ok(false);
        };

        record.tokenizer.state = TokenizerState::Deprecated;
        record.tokenizer.current = None;
        record.meta.updated = now_millis();
        Ok(true)
    }
}
