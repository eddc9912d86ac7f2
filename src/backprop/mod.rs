//! Backprop scheduling
//!
//! The central multi-task policy: decides, per training step, how each
//! task's loss contributes to the shared frontend gradient. Every worker
//! always updates its own parameters with its full loss; the policy only
//! shapes what flows back into the trunk.

mod adaptive;
mod dropout;
mod hyper_volume;
mod plain;
mod softmax;

#[cfg(test)]
mod tests;

pub use adaptive::Adaptive;
pub use dropout::Dropout;
pub use hyper_volume::HyperVolume;
pub use plain::Plain;
pub use softmax::Softmax;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{ForwardPass, Frontend, ModelParts, Worker};
use crate::optim::{clip_grad_norm, Optimizer};
use crate::trainer::WorkerRegistry;
use crate::{Error, Result};

/// Reserved key for the combined loss in a [`LossBundle`]
pub const TOTAL_KEY: &str = "total";

/// Per-batch map from task name to scalar loss, plus the reserved `"total"`
/// entry holding the combined value that was backpropagated into the
/// frontend
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct LossBundle {
    inner: BTreeMap<String, f32>,
}

impl LossBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one task's loss
    pub fn insert(&mut self, name: impl Into<String>, loss: f32) {
        self.inner.insert(name.into(), loss);
    }

    /// Record the combined total
    pub fn set_total(&mut self, total: f32) {
        self.inner.insert(TOTAL_KEY.to_string(), total);
    }

    /// Loss for one task (or the total, under [`TOTAL_KEY`])
    pub fn get(&self, name: &str) -> Option<f32> {
        self.inner.get(name).copied()
    }

    /// The combined total, zero if never set
    pub fn total(&self) -> f32 {
        self.get(TOTAL_KEY).unwrap_or(0.0)
    }

    /// Number of entries, including the total
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// All entries in deterministic (name-sorted) order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Per-task entries, skipping the reserved total
    pub fn task_iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.iter().filter(|(k, _)| *k != TOTAL_KEY)
    }
}

/// A loss-combination policy: maps the per-task loss vector to the weight
/// each task's gradient gets in the shared frontend update
pub trait WeightPolicy {
    /// Policy name for logging
    fn name(&self) -> &'static str;

    /// Frontend gradient weight per task, aligned with `losses`
    fn weights(&mut self, losses: &[f32]) -> Vec<f32>;
}

/// Configured backprop mode, one variant per policy with exactly the
/// hyperparameters that policy needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BackpropMode {
    Plain,
    Dropout { dropout_rate: f32 },
    HyperVolume { delta: f32 },
    Softmax { temperature: f32 },
    Adaptive { temperature: f32, alpha: f32 },
}

impl BackpropMode {
    /// Construct the policy this mode describes
    ///
    /// `seed` fixes the dropout RNG for reproducible runs; other modes are
    /// deterministic and ignore it.
    pub fn build(&self, seed: Option<u64>) -> Result<Box<dyn WeightPolicy>> {
        match *self {
            BackpropMode::Plain => Ok(Box::new(Plain)),
            BackpropMode::Dropout { dropout_rate } => {
                let policy = match seed {
                    Some(seed) => Dropout::with_seed(dropout_rate, seed)?,
                    None => Dropout::new(dropout_rate)?,
                };
                Ok(Box::new(policy))
            }
            BackpropMode::HyperVolume { delta } => Ok(Box::new(HyperVolume::new(delta)?)),
            BackpropMode::Softmax { temperature } => Ok(Box::new(Softmax::new(temperature)?)),
            BackpropMode::Adaptive { temperature, alpha } => {
                Ok(Box::new(Adaptive::new(temperature, alpha)?))
            }
        }
    }

    /// Validate hyperparameters without keeping the policy
    pub fn validate(&self) -> Result<()> {
        self.build(Some(0)).map(|_| ())
    }
}

/// Drives one optimization step across all workers and the frontend
pub struct BackpropScheduler {
    policy: Box<dyn WeightPolicy>,
}

impl BackpropScheduler {
    /// Wrap an explicit policy
    pub fn new(policy: Box<dyn WeightPolicy>) -> Self {
        Self { policy }
    }

    /// Build the policy described by a configured mode
    pub fn from_mode(mode: &BackpropMode, seed: Option<u64>) -> Result<Self> {
        Ok(Self::new(mode.build(seed)?))
    }

    /// Name of the active policy
    pub fn mode(&self) -> &'static str {
        self.policy.name()
    }

    /// Run one training step over a completed forward pass
    ///
    /// 1. every worker computes its own loss and backpropagates it into its
    ///    own parameters, then its optimizer steps (independent of mode);
    /// 2. the policy weights each task's hidden-representation gradient;
    /// 3. the weighted gradients accumulate into the frontend and the
    ///    frontend optimizer steps;
    /// 4. the returned bundle holds every per-task loss plus `"total"`, the
    ///    weighted sum that went into the frontend (the exact unweighted sum
    ///    under the plain policy).
    pub fn step(
        &mut self,
        parts: ModelParts<'_>,
        pass: &ForwardPass,
        registry: &mut WorkerRegistry,
        frontend_optim: &mut dyn Optimizer,
        max_grad_norm: Option<f32>,
    ) -> Result<LossBundle> {
        let ModelParts { frontend, classification, regression } = parts;

        frontend_optim.zero_grad(frontend.params());

        let mut names = Vec::new();
        let mut losses = Vec::new();
        let mut hidden_grads = Vec::new();

        for worker in classification.into_iter().chain(regression) {
            let name = worker.name().to_string();
            let pred = pass
                .preds
                .get(&name)
                .ok_or_else(|| Error::Model(format!("forward pass missing prediction for '{name}'")))?;
            let label = pass
                .labels
                .get(&name)
                .ok_or_else(|| Error::Model(format!("forward pass missing label for '{name}'")))?;
            let slot = registry
                .get_mut(&name)
                .ok_or_else(|| Error::Config(format!("no optimizer registered for worker '{name}'")))?;

            let loss = worker.loss(pred, label);

            // The worker's own update always uses its full loss
            slot.optimizer.zero_grad(worker.params());
            let grad_hidden = worker.backward(pred, label);
            if let Some(max_norm) = max_grad_norm {
                clip_grad_norm(worker.params(), max_norm);
            }
            slot.optimizer.step(worker.params());

            names.push(name);
            losses.push(loss);
            hidden_grads.push(grad_hidden);
        }

        let weights = self.policy.weights(&losses);
        debug_assert_eq!(weights.len(), losses.len());

        let mut total = 0.0;
        for ((&weight, grad), &loss) in weights.iter().zip(&hidden_grads).zip(&losses) {
            if weight != 0.0 {
                frontend.backward(&(grad * weight));
            }
            total += weight * loss;
        }
        if let Some(max_norm) = max_grad_norm {
            clip_grad_norm(frontend.params(), max_norm);
        }
        frontend_optim.step(frontend.params());

        let mut bundle = LossBundle::new();
        for (name, &loss) in names.iter().zip(&losses) {
            bundle.insert(name.clone(), loss);
        }
        bundle.set_total(total);
        Ok(bundle)
    }
}
