//! Lifecycle coordinator.
//!
//! Resolves the single current tokenizer without any lock service. Each
//! step is one conditional update against the store; losing a race to
//! another process is expected and folds back into the resolution loop.

use super::cache::TokenizerCache;
use super::rotation::{RotationPolicy, RotationSampler};
use crate::config::LifecycleSettings;
use crate::derivation::DigestingSigner;
use crate::error::TokenizerError;
use crate::identity::{CapabilityAgent, SecretSource};
use crate::kms::KeystoreProvisioner;
use crate::metrics::{ABSORBED_RACES, TOKENIZER_RESOLUTIONS, record_transition};
use crate::storage::{HmacRef, TokenizerRecord, TokenizerStore};
use crate::tokenizer::Tokenizer;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, instrument, warn};

/// Orchestrates creation, promotion, caching and rotation of tokenizers.
pub struct LifecycleCoordinator {
    store: Arc<dyn TokenizerStore>,
    provisioner: KeystoreProvisioner,
    secret_source: SecretSource,
    sampler: RotationSampler,
    max_attempts: u32,
    rotation_policy: RwLock<Option<Arc<dyn RotationPolicy>>>,
    cache: TokenizerCache,
}

impl LifecycleCoordinator {
    /// Create a coordinator.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `settings` are invalid.
    pub fn new(
        store: Arc<dyn TokenizerStore>,
        provisioner: KeystoreProvisioner,
        settings: &LifecycleSettings,
    ) -> Result<Self, TokenizerError> {
        settings.validate()?;
        Ok(Self {
            store,
            provisioner,
            secret_source: settings.secret_source.clone(),
            sampler: RotationSampler::new(settings.rotation_sample_probability)?,
            max_attempts: settings.max_resolve_attempts,
            rotation_policy: RwLock::new(None),
            cache: TokenizerCache::new(),
        })
    }

    /// Replace the rotation sampler.
    #[must_use]
    pub fn with_sampler(mut self, sampler: RotationSampler) -> Self {
        self.sampler = sampler;
        self
    }

    /// Install or remove the rotation policy.
    pub fn set_rotation_policy(&self, policy: Option<Arc<dyn RotationPolicy>>) {
        *self
            .rotation_policy
            .write()
            .unwrap_or_else(PoisonError::into_inner) = policy;
    }

    fn rotation_policy(&self) -> Option<Arc<dyn RotationPolicy>> {
        self.rotation_policy
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Resolve the current tokenizer, creating or rotating as needed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if a record changed under provisioning,
    /// `Operation`/`Permission` for key-custody failures and
    /// `CoordinationTimeout` if no current record appears in time.
    #[instrument(skip(self))]
    pub async fn get_current(&self) -> Result<Tokenizer, TokenizerError> {
        if self.sampler.sample() {
            self.rotation_check().await?;
        }

        if let Some(tokenizer) = self.cache.get() {
            TOKENIZER_RESOLUTIONS.with_label_values(&["cache"]).inc();
            return Ok(tokenizer);
        }

        for _ in 0..self.max_attempts {
            let epoch = self.cache.epoch();
            let record = self.resolve_current_record().await?;
            let tokenizer = self.tokenizer_from_record(&record).await?;
            if self.cache.store_if(epoch, tokenizer.clone()) {
                TOKENIZER_RESOLUTIONS.with_label_values(&["store"]).inc();
                return Ok(tokenizer);
            }
            // Deprecated in this process while resolving; the record may be stale.
            debug!(tokenizer_id = %tokenizer.id(), "Cache invalidated during resolution");
        }

        Err(TokenizerError::CoordinationTimeout {
            attempts: self.max_attempts,
        })
    }

    /// Fetch a tokenizer by id, including deprecated ones.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no record has `id`.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Tokenizer, TokenizerError> {
        if let Some(tokenizer) = self.cache.get_if(id) {
            return Ok(tokenizer);
        }
        let record = self.record(id).await?;
        self.tokenizer_from_record(&record).await
    }

    /// Raw lifecycle record for `id`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no record has `id`.
    pub async fn record(&self, id: &str) -> Result<TokenizerRecord, TokenizerError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| TokenizerError::not_found(format!("Tokenizer {id}")))
    }

    /// Deprecate the current tokenizer.
    ///
    /// Returns `true` if a tokenizer was deprecated.
    ///
    /// # Errors
    ///
    /// Returns a database error if the update fails.
    #[instrument(skip(self))]
    pub async fn deprecate_current(&self) -> Result<bool, TokenizerError> {
        let deprecated = self.store.deprecate_current().await?;
        self.cache.invalidate();
        if deprecated {
            record_transition("deprecate", "ok");
            info!("Deprecated current tokenizer");
        } else {
            record_transition("deprecate", "noop");
        }
        Ok(deprecated)
    }

    async fn rotation_check(&self) -> Result<(), TokenizerError> {
        if let Some(policy) = self.rotation_policy() {
            if policy.should_rotate().await? {
                self.deprecate_current().await?;
                return Ok(());
            }
        }

        // Drop a cache entry made stale by another process's rotation.
        if let Some(cached) = self.cache.get() {
            let current = self.store.find_current().await?;
            if current.as_ref().map(TokenizerRecord::id) != Some(cached.id()) {
                debug!(tokenizer_id = %cached.id(), "Cached tokenizer is no longer current");
                self.cache.invalidate();
            }
        }
        Ok(())
    }

    async fn resolve_current_record(&self) -> Result<TokenizerRecord, TokenizerError> {
        for attempt in 1..=self.max_attempts {
            if let Some(record) = self.store.find_current().await? {
                return Ok(record);
            }
            debug!(attempt, "No current tokenizer");

            if self.promote().await? {
                continue;
            }
            self.create().await?;
        }

        warn!(attempts = self.max_attempts, "Gave up resolving current tokenizer");
        Err(TokenizerError::CoordinationTimeout {
            attempts: self.max_attempts,
        })
    }

    /// Promote any ready record. A lost uniqueness race counts as success.
    #[instrument(skip(self))]
    async fn promote(&self) -> Result<bool, TokenizerError> {
        match self.store.mark_ready_as_current().await {
            Ok(true) => {
                record_transition("promote", "ok");
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(TokenizerError::Duplicate(_)) => {
                debug!("Another process promoted a tokenizer first");
                ABSORBED_RACES.with_label_values(&["promote"]).inc();
                Ok(true)
            }
            Err(e) => {
                record_transition("promote", "error");
                Err(e)
            }
        }
    }

    /// Create and provision a new tokenizer.
    #[instrument(skip(self))]
    async fn create(&self) -> Result<(), TokenizerError> {
        let seed = self.secret_source.fresh();
        let agent = Arc::new(self.secret_source.derive(&seed)?);
        let record = TokenizerRecord::pending(
            agent.id(),
            seed.handle.as_str(),
            seed.persisted_secret.as_deref().map(Vec::as_slice),
        );

        match self.store.insert(&record).await {
            Ok(()) => record_transition("create", "ok"),
            Err(TokenizerError::Duplicate(_)) => {
                debug!(tokenizer_id = %agent.id(), "Tokenizer already created");
                ABSORBED_RACES.with_label_values(&["create"]).inc();
                return Ok(());
            }
            Err(e) => {
                record_transition("create", "error");
                return Err(e);
            }
        }

        let result = self.provision(Arc::clone(&agent)).await;
        match &result {
            Ok(()) => record_transition("provision", "ok"),
            Err(e) => {
                record_transition("provision", "error");
                warn!(tokenizer_id = %agent.id(), error = %e, "Failed to provision tokenizer");
            }
        }
        result
    }

    async fn provision(&self, agent: Arc<CapabilityAgent>) -> Result<(), TokenizerError> {
        let keystore = self.provisioner.create_tokenizer_keystore(&agent).await?;
        let key = self
            .provisioner
            .generate_key(&keystore.id, "hmac", Arc::clone(&agent))
            .await?;
        let hmac = HmacRef {
            id: key.id().to_string(),
            key_type: key.key_type().suite().to_string(),
        };

        self.store
            .add_keystore_and_hmac(agent.id(), &keystore.id, &hmac)
            .await?;
        info!(tokenizer_id = %agent.id(), keystore = %keystore.id, "Tokenizer ready");
        Ok(())
    }

    async fn tokenizer_from_record(
        &self,
        record: &TokenizerRecord,
    ) -> Result<Tokenizer, TokenizerError> {
        let (keystore_id, hmac) = record.provisioned_keys()?;
        let secret = record.decode_secret()?;
        let agent = self
            .secret_source
            .restore(&record.tokenizer.handle, secret.as_deref().map(Vec::as_slice))?;
        if agent.id() != record.id() {
            return Err(TokenizerError::invalid_state(format!(
                "Secret for tokenizer {} derives a different identity",
                record.id()
            )));
        }

        // The agent must still control the keystore backing the key.
        let keystore = self.provisioner.get_keystore(keystore_id, &agent).await?;
        if keystore.controller != agent.id() {
            return Err(TokenizerError::Permission(format!(
                "Keystore {} is not controlled by tokenizer {}",
                keystore.id,
                record.id()
            )));
        }

        let key = self
            .provisioner
            .key_handle(&hmac.id, &hmac.key_type, Arc::new(agent))?
            .into_hmac()?;
        Ok(Tokenizer::new(record.id(), Arc::new(DigestingSigner::new(key))))
    }
}
