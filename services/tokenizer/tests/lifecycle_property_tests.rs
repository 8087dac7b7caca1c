//! Property-based tests for tokenizer lifecycle.

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use tokenizer_service::LifecycleCoordinator;
use tokenizer_service::config::{KmsSettings, LifecycleSettings};
use tokenizer_service::identity::{CapabilityAgent, PRIMARY_HANDLE, SecretSource};
use tokenizer_service::kms::{KeystoreProvisioner, MockKms};
use tokenizer_service::lifecycle::RotationSampler;
use tokenizer_service::storage::{MemoryTokenizerStore, TokenizerRecord, TokenizerState};
use tokio::task::JoinSet;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    /// For any number of racing instances, exactly one tokenizer ends current
    /// and every instance receives it.
    #[test]
    fn prop_racing_instances_converge(instances in 1usize..12) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (ids, current) = rt.block_on(async {
            let store = Arc::new(MemoryTokenizerStore::new());
            let kms = Arc::new(MockKms::new());

            let mut tasks = JoinSet::new();
            for _ in 0..instances {
                let provisioner =
                    KeystoreProvisioner::new(kms.clone(), KmsSettings::new("https://kms.test/kms"));
                let coordinator =
                    LifecycleCoordinator::new(store.clone(), provisioner, &LifecycleSettings::default())
                        .unwrap()
                        .with_sampler(RotationSampler::never());
                tasks.spawn(async move { coordinator.get_current().await });
            }

            let mut ids = HashSet::new();
            while let Some(result) = tasks.join_next().await {
                ids.insert(result.unwrap().unwrap().id().to_string());
            }
            (ids, store.count_in_state(TokenizerState::Current).await)
        });

        prop_assert_eq!(ids.len(), 1);
        prop_assert_eq!(current, 1);
    }

    /// A secret stored in a record restores the same identity.
    #[test]
    fn prop_stored_secret_restores_identity(secret in prop::collection::vec(any::<u8>(), 1..64)) {
        let agent = CapabilityAgent::from_secret(PRIMARY_HANDLE, &secret).unwrap();
        let record = TokenizerRecord::pending(agent.id(), PRIMARY_HANDLE, Some(secret.as_slice()));

        let decoded = record.decode_secret().unwrap().unwrap();
        let restored = SecretSource::PerTokenizer
            .restore(&record.tokenizer.handle, Some(decoded.as_slice()))
            .unwrap();
        prop_assert_eq!(restored.id(), record.id());
    }

    /// Tokens are stable per tokenizer for any input.
    #[test]
    fn prop_tokens_are_deterministic(value in prop::collection::vec(any::<u8>(), 0..256)) {
        let (a, b, verified) = tokio_test::block_on(async {
            let provisioner = KeystoreProvisioner::new(
                Arc::new(MockKms::new()),
                KmsSettings::new("https://kms.test/kms"),
            );
            let coordinator = LifecycleCoordinator::new(
                Arc::new(MemoryTokenizerStore::new()),
                provisioner,
                &LifecycleSettings::default(),
            )
            .unwrap();
            let tokenizer = coordinator.get_current().await.unwrap();
            let a = tokenizer.tokenize(&value).await.unwrap();
            let b = tokenizer.tokenize(&value).await.unwrap();
            let verified = tokenizer.verify_token(&value, &a).await.unwrap();
            (a, b, verified)
        });

        prop_assert_eq!(a.len(), 32);
        prop_assert_eq!(a, b);
        prop_assert!(verified);
    }
}
