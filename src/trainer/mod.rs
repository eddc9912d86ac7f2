//! Training orchestration
//!
//! The [`Trainer`] owns every optimizer, schedule and saver, keyed through a
//! single [`WorkerRegistry`] so the per-worker collections can never drift
//! out of sync with the model's worker list.

mod core;
mod registry;
mod resume;
mod train_loop;

pub use core::Trainer;
pub use registry::{WorkerRegistry, WorkerSlot};
