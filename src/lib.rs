//! Hablar: multi-task self-supervised speech representation training
//!
//! A shared frontend encoder feeds classification and regression worker
//! heads, each with its own optimizer and polynomial learning-rate decay,
//! combined through a configurable backprop-scheduling policy. The crate
//! provides:
//!
//! - Loss-combination policies (plain, dropout, hyper_volume, softmax,
//!   adaptive) behind one [`backprop::WeightPolicy`] seam
//! - Per-component optimizers ([`optim::SGD`], [`optim::Adam`]) with
//!   checkpointable state
//! - Poly learning-rate scheduling per optimizer
//! - Atomic, retention-limited per-component checkpointing with strict
//!   global-step consistency on resume
//! - A [`trainer::Trainer`] driving any model behind the
//!   [`model::SpeechModel`] collaborator contract
//!
//! # Example
//!
//! ```no_run
//! use hablar::config::TrainerConfig;
//! use hablar::model::{demo_batches, demo_model, Device};
//! use hablar::trainer::Trainer;
//!
//! # fn main() -> hablar::Result<()> {
//! let cfg = TrainerConfig::from_yaml("train.yaml")?;
//! let dim = cfg.batch_size;
//! let mut trainer = Trainer::new(demo_model(dim), cfg, None)?;
//!
//! let batches = demo_batches(dim, 32);
//! let valid = demo_batches(dim, 8);
//! trainer.train(
//!     move || batches.clone().into_iter(),
//!     move || valid.clone().into_iter(),
//!     Device::Cpu,
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod backprop;
pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod optim;
pub mod tensor;
pub mod trainer;

pub use error::{Error, Result};
pub use tensor::Tensor;
