//! Smoothed softmax weighting policy

use super::softmax::softmax_weights;
use super::WeightPolicy;
use crate::{Error, Result};

/// Softmax weighting with an exponential moving average across steps
///
/// Formula: w_t = alpha * w_{t-1} + (1 - alpha) * softmax(l / temperature)
///
/// The EMA keeps the weight vector tracking loss trends instead of reacting
/// to single-step noise. The first step uses the raw softmax vector.
pub struct Adaptive {
    temperature: f32,
    alpha: f32,
    ema: Option<Vec<f32>>,
}

impl Adaptive {
    /// # Errors
    /// `temperature <= 0` or `alpha` outside `[0, 1]` is a fatal
    /// configuration error.
    pub fn new(temperature: f32, alpha: f32) -> Result<Self> {
        if !temperature.is_finite() || temperature <= 0.0 {
            return Err(Error::Config(format!(
                "adaptive mode needs temperature > 0, got {temperature}"
            )));
        }
        if !alpha.is_finite() || !(0.0..=1.0).contains(&alpha) {
            return Err(Error::Config(format!(
                "adaptive mode needs alpha in [0, 1], got {alpha}"
            )));
        }
        Ok(Self { temperature, alpha, ema: None })
    }

    /// Configured smoothing factor
    pub fn alpha(&self) -> f32 {
        self.alpha
    }
}

impl WeightPolicy for Adaptive {
    fn name(&self) -> &'static str {
        "adaptive"
    }

    fn weights(&mut self, losses: &[f32]) -> Vec<f32> {
        let instant = softmax_weights(losses, self.temperature);
        let smoothed = match &self.ema {
            // Worker count changed means the EMA is stale; start over
            Some(prev) if prev.len() == instant.len() => prev
                .iter()
                .zip(&instant)
                .map(|(&p, &w)| self.alpha * p + (1.0 - self.alpha) * w)
                .collect(),
            _ => instant,
        };
        self.ema = Some(smoothed.clone());
        smoothed
    }
}
