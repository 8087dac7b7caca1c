//! Prometheus metrics for the Tokenizer Service.

use once_cell::sync::Lazy;
use prometheus::{CounterVec, HistogramVec, register_counter_vec, register_histogram_vec};

/// Current tokenizer resolutions by source.
pub static TOKENIZER_RESOLUTIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tokenizer_service_resolutions_total",
        "Total number of current tokenizer resolutions",
        &["source"]
    )
    .expect("Failed to register resolutions metric")
});

/// Lifecycle transitions by kind and outcome.
pub static LIFECYCLE_TRANSITIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tokenizer_service_lifecycle_transitions_total",
        "Total number of tokenizer lifecycle transitions",
        &["transition", "outcome"]
    )
    .expect("Failed to register lifecycle_transitions metric")
});

/// Races with another process that were absorbed.
pub static ABSORBED_RACES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tokenizer_service_absorbed_races_total",
        "Total number of lifecycle races absorbed",
        &["kind"]
    )
    .expect("Failed to register absorbed_races metric")
});

/// Key-custody operation latency.
pub static KMS_OPERATION_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "tokenizer_service_kms_operation_latency_seconds",
        "Key-custody operation latency in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to register kms_operation_latency metric")
});

/// Record a lifecycle transition outcome.
pub fn record_transition(transition: &str, outcome: &str) {
    LIFECYCLE_TRANSITIONS
        .with_label_values(&[transition, outcome])
        .inc();
}
