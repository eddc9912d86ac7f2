//! Core Trainer struct and construction

use super::registry::{WorkerRegistry, WorkerSlot};
use crate::backprop::BackpropScheduler;
use crate::checkpoint::Saver;
use crate::config::TrainerConfig;
use crate::logging::LogSink;
use crate::model::{Frontend, SpeechModel, TaskKind, Worker};
use crate::optim::{build_optimizer, Optimizer, PolyLR};
use crate::{Error, Result};

pub(crate) const FRONTEND_PREFIX: &str = "FE-";
pub(crate) const FRONTEND_LABEL: &str = "FE";

/// Orchestrates multi-task training over a model
///
/// Owns one optimizer + poly schedule + saver for the frontend and one
/// bundle per worker via the [`WorkerRegistry`]; every step flows through
/// the configured [`BackpropScheduler`] policy.
pub struct Trainer<M: SpeechModel> {
    pub(crate) model: M,
    pub(crate) cfg: TrainerConfig,
    pub(crate) frontend_optim: Box<dyn Optimizer>,
    pub(crate) frontend_scheduler: PolyLR,
    pub(crate) frontend_saver: Saver,
    pub(crate) registry: WorkerRegistry,
    pub(crate) backprop: BackpropScheduler,
    pub(crate) sink: Option<Box<dyn LogSink>>,
    pub(crate) global_step: u64,
}

impl<M: SpeechModel> Trainer<M> {
    /// Build a trainer from a model and a validated configuration
    ///
    /// Creates every optimizer/schedule/saver from the model's worker list.
    /// With `ckpt_continue` set, restores the latest checkpoint of every
    /// component and fails on any global-step disagreement.
    pub fn new(
        mut model: M,
        cfg: TrainerConfig,
        sink: Option<Box<dyn LogSink>>,
    ) -> Result<Self> {
        cfg.validate()?;

        let frontend_optim = build_optimizer(&cfg.fe_opt, cfg.fe_lr)?;
        let frontend_scheduler = PolyLR::new("frontend", cfg.fe_lr, cfg.epochs, cfg.bpe)?;
        let frontend_saver = Saver::new(&cfg.save_path, FRONTEND_PREFIX, cfg.max_ckpts)?;
        let backprop = BackpropScheduler::from_mode(&cfg.backprop, cfg.seed)?;

        let worker_info: Vec<(String, TaskKind)> = {
            let parts = model.parts();
            parts
                .classification
                .iter()
                .map(|w| (w.name().to_string(), TaskKind::Classification))
                .chain(
                    parts
                        .regression
                        .iter()
                        .map(|w| (w.name().to_string(), TaskKind::Regression)),
                )
                .collect()
        };
        if worker_info.is_empty() {
            return Err(Error::Config("model exposes no workers".to_string()));
        }

        let mut registry = WorkerRegistry::new();
        for (name, kind) in worker_info {
            let slot = WorkerSlot {
                kind,
                optimizer: build_optimizer(&cfg.min_opt, cfg.min_lr)?,
                scheduler: PolyLR::new(&name, cfg.min_lr, cfg.epochs, cfg.bpe)?,
                saver: Saver::new(&cfg.save_path, format!("M-{name}-"), cfg.max_ckpts)?,
            };
            registry.insert(name, slot)?;
        }

        let mut trainer = Self {
            model,
            cfg,
            frontend_optim,
            frontend_scheduler,
            frontend_saver,
            registry,
            backprop,
            sink,
            global_step: 0,
        };

        if trainer.cfg.ckpt_continue {
            trainer.resume()?;
        }
        Ok(trainer)
    }

    /// Global step all components were last persisted at
    pub fn global_step(&self) -> u64 {
        self.global_step
    }

    /// Name of the active backprop policy
    pub fn backprop_mode(&self) -> &'static str {
        self.backprop.mode()
    }

    /// The driven model
    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// The worker registry
    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    /// The active configuration
    pub fn config(&self) -> &TrainerConfig {
        &self.cfg
    }

    /// Persist every component's checkpoint at `step`
    ///
    /// Writes are synchronous; any failure aborts before the next epoch can
    /// begin.
    pub(crate) fn save_all(&mut self, step: u64) -> Result<()> {
        let parts = self.model.parts();
        self.frontend_saver.save(
            FRONTEND_LABEL,
            step,
            parts.frontend.params(),
            self.frontend_optim.as_ref(),
        )?;

        for worker in parts.classification.into_iter().chain(parts.regression) {
            let name = worker.name().to_string();
            let slot = self
                .registry
                .get_mut(&name)
                .ok_or_else(|| Error::Config(format!("worker '{name}' has no registry slot")))?;
            slot.saver.save(
                &format!("M-{name}"),
                step,
                worker.params(),
                slot.optimizer.as_ref(),
            )?;
        }
        Ok(())
    }
}
