//! Polynomial decay learning rate scheduler

use crate::optim::Optimizer;
use crate::{Error, Result};

/// Polynomial decay scheduler
///
/// Formula: lr = base_lr * (1 - iter / total)^power
///
/// Where:
/// - iter is `epoch * iters_per_epoch + batch_idx`
/// - total is `num_epochs * iters_per_epoch`
///
/// The decay base is clamped at zero so an off-by-one batch index past the
/// schedule end can never produce a negative or NaN rate. The rate is fully
/// determined by (epoch, batch_idx); the scheduler additionally tracks its
/// cumulative step count and the last loss it was stepped with, for
/// diagnostics and checkpoint inspection.
pub struct PolyLR {
    optim_name: String,
    base_lr: f32,
    power: f32,
    num_epochs: usize,
    iters_per_epoch: usize,
    steps: u64,
    last_loss: Option<f32>,
}

impl PolyLR {
    /// Create a scheduler with the standard poly exponent (0.9)
    ///
    /// # Errors
    /// Zero `num_epochs` or `iters_per_epoch` is a fatal configuration error.
    pub fn new(
        optim_name: impl Into<String>,
        base_lr: f32,
        num_epochs: usize,
        iters_per_epoch: usize,
    ) -> Result<Self> {
        Self::with_power(optim_name, base_lr, num_epochs, iters_per_epoch, 0.9)
    }

    /// Create a scheduler with an explicit poly exponent
    pub fn with_power(
        optim_name: impl Into<String>,
        base_lr: f32,
        num_epochs: usize,
        iters_per_epoch: usize,
        power: f32,
    ) -> Result<Self> {
        let optim_name = optim_name.into();
        if num_epochs == 0 || iters_per_epoch == 0 {
            return Err(Error::Config(format!(
                "poly schedule for '{optim_name}' needs non-zero epochs and iters_per_epoch \
                 (got {num_epochs} x {iters_per_epoch})"
            )));
        }
        if !base_lr.is_finite() || base_lr <= 0.0 {
            return Err(Error::Config(format!(
                "poly schedule for '{optim_name}' needs a positive base rate (got {base_lr})"
            )));
        }
        Ok(Self {
            optim_name,
            base_lr,
            power,
            num_epochs,
            iters_per_epoch,
            steps: 0,
            last_loss: None,
        })
    }

    /// Name of the optimizer this schedule drives
    pub fn optim_name(&self) -> &str {
        &self.optim_name
    }

    /// Rate at a given position in the schedule, without mutating anything
    pub fn rate_at(&self, batch_idx: usize, epoch: usize) -> f32 {
        let iter = epoch * self.iters_per_epoch + batch_idx;
        let total = self.num_epochs * self.iters_per_epoch;
        let base = 1.0 - iter as f32 / total as f32;
        self.base_lr * base.max(0.0).powf(self.power)
    }

    /// Update the optimizer's learning rate for the current position
    ///
    /// Records the observed loss and returns the new rate.
    pub fn step(
        &mut self,
        optimizer: &mut dyn Optimizer,
        batch_idx: usize,
        epoch: usize,
        loss: f32,
    ) -> f32 {
        let rate = self.rate_at(batch_idx, epoch);
        optimizer.set_lr(rate);
        self.steps += 1;
        self.last_loss = Some(loss);
        rate
    }

    /// Cumulative number of scheduler steps taken
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Loss value observed at the most recent step
    pub fn last_loss(&self) -> Option<f32> {
        self.last_loss
    }
}
