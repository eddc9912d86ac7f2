//! Temperature-scaled softmax weighting policy

use super::WeightPolicy;
use crate::{Error, Result};

/// Weight each task by a softmax over the task losses scaled by a
/// temperature
///
/// Tasks with higher relative loss receive proportionally more frontend
/// gradient. The weight vector always sums to 1. Low temperatures sharpen
/// the distribution toward the worst task; high temperatures flatten it
/// toward uniform.
pub struct Softmax {
    temperature: f32,
}

impl Softmax {
    /// # Errors
    /// Non-positive or non-finite `temperature` is a fatal configuration
    /// error.
    pub fn new(temperature: f32) -> Result<Self> {
        if !temperature.is_finite() || temperature <= 0.0 {
            return Err(Error::Config(format!(
                "softmax mode needs temperature > 0, got {temperature}"
            )));
        }
        Ok(Self { temperature })
    }

    /// Configured temperature
    pub fn temperature(&self) -> f32 {
        self.temperature
    }
}

/// Max-subtracted softmax over `losses / temperature`
pub(crate) fn softmax_weights(losses: &[f32], temperature: f32) -> Vec<f32> {
    if losses.is_empty() {
        return Vec::new();
    }
    let max = losses.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = losses.iter().map(|&l| ((l - max) / temperature).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

impl WeightPolicy for Softmax {
    fn name(&self) -> &'static str {
        "softmax"
    }

    fn weights(&mut self, losses: &[f32]) -> Vec<f32> {
        softmax_weights(losses, self.temperature)
    }
}
