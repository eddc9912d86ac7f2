//! Hypervolume-style normalized-loss weighting policy

use super::WeightPolicy;
use crate::{Error, Result};

/// Deterministic normalized-loss weighting with sensitivity `delta`
///
/// Formula: w_i = l_i^delta / sum_j l_j^delta
///
/// `delta` controls the trade-off curvature between tasks: as delta
/// approaches 0 the weights flatten toward uniform; delta = 1 weights each
/// task proportionally to its loss; larger delta concentrates the frontend
/// gradient on the highest-loss tasks. Identical losses and delta always
/// produce identical weights.
pub struct HyperVolume {
    delta: f32,
}

const LOSS_FLOOR: f32 = 1e-12;

impl HyperVolume {
    /// # Errors
    /// Non-positive or non-finite `delta` is a fatal configuration error.
    pub fn new(delta: f32) -> Result<Self> {
        if !delta.is_finite() || delta <= 0.0 {
            return Err(Error::Config(format!(
                "hyper_volume mode needs delta > 0, got {delta}"
            )));
        }
        Ok(Self { delta })
    }

    /// Configured sensitivity
    pub fn delta(&self) -> f32 {
        self.delta
    }
}

impl WeightPolicy for HyperVolume {
    fn name(&self) -> &'static str {
        "hyper_volume"
    }

    fn weights(&mut self, losses: &[f32]) -> Vec<f32> {
        if losses.is_empty() {
            return Vec::new();
        }
        let powered: Vec<f32> =
            losses.iter().map(|&l| l.max(LOSS_FLOOR).powf(self.delta)).collect();
        let sum: f32 = powered.iter().sum();
        powered.into_iter().map(|p| p / sum).collect()
    }
}
