//! Declarative training configuration
//!
//! The recognized options mirror the training surface: schedule shape,
//! optimizer kinds and rates, checkpointing, and the backprop mode with
//! exactly its own hyperparameters. Options irrelevant to the selected mode
//! are ignored.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::backprop::BackpropMode;
use crate::optim::build_optimizer;
use crate::{Error, Result};

fn default_log_freq() -> usize {
    100
}

fn default_max_ckpts() -> usize {
    5
}

fn default_opt() -> String {
    "adam".to_string()
}

/// Full training configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Number of training epochs
    pub epochs: usize,
    /// Elements per input chunk
    pub batch_size: usize,
    /// Batches per training epoch
    pub bpe: usize,
    /// Batches per evaluation pass
    pub va_bpe: usize,
    /// Directory for checkpoints and fallback snapshots
    pub save_path: PathBuf,
    /// Scheduler/logging interval in batches
    #[serde(default = "default_log_freq")]
    pub log_freq: usize,
    /// Checkpoints retained per component
    #[serde(default = "default_max_ckpts")]
    pub max_ckpts: usize,
    /// Frontend optimizer kind
    #[serde(default = "default_opt")]
    pub fe_opt: String,
    /// Frontend base learning rate
    pub fe_lr: f32,
    /// Worker optimizer kind
    #[serde(default = "default_opt")]
    pub min_opt: String,
    /// Worker base learning rate
    pub min_lr: f32,
    /// Resume from the latest consistent checkpoint set
    #[serde(default)]
    pub ckpt_continue: bool,
    /// Loss-combination policy and its hyperparameters
    pub backprop: BackpropMode,
    /// Optional global-norm gradient clip
    #[serde(default)]
    pub max_grad_norm: Option<f32>,
    /// Optional RNG seed for reproducible dropout-mode runs
    #[serde(default)]
    pub seed: Option<u64>,
}

impl TrainerConfig {
    /// Load and validate a YAML configuration file
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        let cfg: TrainerConfig = serde_yaml::from_str(&yaml)
            .map_err(|e| Error::Config(format!("failed to parse config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check everything that must fail fast at construction
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(Error::Config("epochs must be >= 1".to_string()));
        }
        if self.bpe == 0 || self.va_bpe == 0 {
            return Err(Error::Config("bpe and va_bpe must be >= 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be >= 1".to_string()));
        }
        if self.log_freq == 0 {
            return Err(Error::Config("log_freq must be >= 1".to_string()));
        }
        if self.max_ckpts == 0 {
            return Err(Error::Config("max_ckpts must be >= 1".to_string()));
        }
        for (field, lr) in [("fe_lr", self.fe_lr), ("min_lr", self.min_lr)] {
            if !lr.is_finite() || lr <= 0.0 {
                return Err(Error::Config(format!("{field} must be positive, got {lr}")));
            }
        }
        if let Some(max_norm) = self.max_grad_norm {
            if !max_norm.is_finite() || max_norm <= 0.0 {
                return Err(Error::Config(format!(
                    "max_grad_norm must be positive, got {max_norm}"
                )));
            }
        }
        // Unsupported kinds fail here, before any training state exists
        build_optimizer(&self.fe_opt, self.fe_lr)?;
        build_optimizer(&self.min_opt, self.min_lr)?;
        self.backprop.validate()?;
        Ok(())
    }
}
