//! Rotation policy and sampling.

use crate::error::TokenizerError;
use async_trait::async_trait;
use rand::Rng;

/// Decides whether the current tokenizer should be rotated.
#[async_trait]
pub trait RotationPolicy: Send + Sync {
    async fn should_rotate(&self) -> Result<bool, TokenizerError>;
}

#[async_trait]
impl<F> RotationPolicy for F
where
    F: Fn() -> bool + Send + Sync,
{
    async fn should_rotate(&self) -> Result<bool, TokenizerError> {
        Ok(self())
    }
}

/// Gates how often the rotation policy is consulted.
#[derive(Debug, Clone, Copy)]
pub struct RotationSampler {
    probability: f64,
}

impl RotationSampler {
    /// Sampler firing with `probability`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error outside `[0, 1]`.
    pub fn new(probability: f64) -> Result<Self, TokenizerError> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(TokenizerError::config(format!(
                "Rotation sample probability must be within [0, 1], got {probability}"
            )));
        }
        Ok(Self { probability })
    }

    #[must_use]
    pub const fn always() -> Self {
        Self { probability: 1.0 }
    }

    #[must_use]
    pub const fn never() -> Self {
        Self { probability: 0.0 }
    }

    #[must_use]
    pub const fn probability(&self) -> f64 {
        self.probability
    }

    pub fn sample(&self) -> bool {
        rand::thread_rng().gen_bool(self.probability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        assert!(RotationSampler::new(-0.1).is_err());
        assert!(RotationSampler::new(1.01).is_err());
        assert!(RotationSampler::new(f64::NAN).is_err());
        assert!(RotationSampler::new(0.2).is_ok());
    }

    #[test]
    fn test_extremes() {
        let always = RotationSampler::always();
        let never = RotationSampler::never();
        for _ in 0..100 {
            assert!(always.sample());
            assert!(!never.sample());
        }
    }

    #[tokio::test]
    async fn test_closure_policy() {
        let policy = || true;
        assert!(policy.should_rotate().await.unwrap());
    }
}
