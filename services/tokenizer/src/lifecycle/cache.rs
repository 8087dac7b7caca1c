//! Process-local slot for the resolved current tokenizer.

use crate::tokenizer::Tokenizer;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

/// Last resolved current tokenizer, last writer wins.
///
/// Every invalidation starts a new epoch. A resolution that began in an
/// earlier epoch may not fill the slot.
#[derive(Debug, Default)]
pub struct TokenizerCache {
    slot: RwLock<Option<Tokenizer>>,
    epoch: AtomicU64,
}

impl TokenizerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Tokenizer> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Cached tokenizer if it has `id`.
    pub fn get_if(&self, id: &str) -> Option<Tokenizer> {
        self.get().filter(|t| t.id() == id)
    }

    /// Epoch to pass to [`Self::store_if`] once a resolution completes.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Fill the slot unless it was invalidated since `epoch`.
    pub fn store_if(&self, epoch: u64, tokenizer: Tokenizer) -> bool {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        if self.epoch.load(Ordering::Acquire) != epoch {
            return false;
        }
        *slot = Some(tokenizer);
        true
    }

    pub fn invalidate(&self) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        self.epoch.fetch_add(1, Ordering::AcqRel);
        slot.take();
    }
}
