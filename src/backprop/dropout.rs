//! Stochastic worker-exclusion policy

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::WeightPolicy;
use crate::{Error, Result};

/// Exclude each worker from the frontend gradient independently with
/// probability `rate` per step
///
/// Excluded workers still update their own parameters with their full loss;
/// they only skip contributing to the trunk for that step.
pub struct Dropout {
    rate: f32,
    rng: StdRng,
}

impl Dropout {
    /// Create a dropout policy with an OS-seeded RNG
    ///
    /// # Errors
    /// `rate` outside `[0, 1)` is a fatal configuration error.
    pub fn new(rate: f32) -> Result<Self> {
        Self::build(rate, StdRng::from_os_rng())
    }

    /// Create a dropout policy with a fixed seed (reproducible runs, tests)
    pub fn with_seed(rate: f32, seed: u64) -> Result<Self> {
        Self::build(rate, StdRng::seed_from_u64(seed))
    }

    fn build(rate: f32, rng: StdRng) -> Result<Self> {
        if !rate.is_finite() || !(0.0..1.0).contains(&rate) {
            return Err(Error::Config(format!(
                "dropout mode needs dropout_rate in [0, 1), got {rate}"
            )));
        }
        Ok(Self { rate, rng })
    }

    /// Configured exclusion probability
    pub fn rate(&self) -> f32 {
        self.rate
    }
}

impl WeightPolicy for Dropout {
    fn name(&self) -> &'static str {
        "dropout"
    }

    fn weights(&mut self, losses: &[f32]) -> Vec<f32> {
        losses
            .iter()
            .map(|_| if self.rng.random::<f32>() < self.rate { 0.0 } else { 1.0 })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropout_rejects_bad_rates() {
        assert!(Dropout::new(-0.1).is_err());
        assert!(Dropout::new(1.0).is_err());
        assert!(Dropout::new(f32::NAN).is_err());
    }

    #[test]
    fn test_dropout_zero_rate_keeps_everyone() {
        let mut policy = Dropout::with_seed(0.0, 7).unwrap();
        for _ in 0..50 {
            assert_eq!(policy.weights(&[1.0, 2.0, 3.0]), vec![1.0, 1.0, 1.0]);
        }
    }

    #[test]
    fn test_dropout_empirical_rate_converges() {
        let rate = 0.3;
        let mut policy = Dropout::with_seed(rate, 42).unwrap();

        let trials = 20_000;
        let mut excluded = 0usize;
        for _ in 0..trials {
            excluded += policy.weights(&[1.0]).iter().filter(|&&w| w == 0.0).count();
        }

        let empirical = excluded as f32 / trials as f32;
        assert!(
            (empirical - rate).abs() < 0.02,
            "empirical exclusion rate {empirical} too far from {rate}"
        );
    }

    #[test]
    fn test_dropout_seeded_is_reproducible() {
        let mut a = Dropout::with_seed(0.5, 99).unwrap();
        let mut b = Dropout::with_seed(0.5, 99).unwrap();
        for _ in 0..100 {
            assert_eq!(a.weights(&[1.0, 1.0]), b.weights(&[1.0, 1.0]));
        }
    }
}
