//! Checkpoint resume

use log::info;

use super::core::Trainer;
use crate::model::{Frontend, SpeechModel, Worker};
use crate::{Error, Result};

impl<M: SpeechModel> Trainer<M> {
    /// Restore every component from its latest checkpoint
    ///
    /// No component having a checkpoint is the expected fresh-start case
    /// and a no-op. Anything in between — some components saved, some not,
    /// or saved at different global steps — means the optimizer states have
    /// desynchronized and resuming would silently corrupt training, so it
    /// is a fatal consistency error.
    pub(crate) fn resume(&mut self) -> Result<()> {
        let frontend_latest = self.frontend_saver.read_latest_checkpoint();

        let worker_latest: Vec<(String, Option<String>)> = self
            .registry
            .iter()
            .map(|(name, slot)| (name.to_string(), slot.saver.read_latest_checkpoint()))
            .collect();

        let total = 1 + worker_latest.len();
        let present =
            usize::from(frontend_latest.is_some())
                + worker_latest.iter().filter(|(_, latest)| latest.is_some()).count();

        if present == 0 {
            info!(
                "no checkpoints under {}, starting fresh",
                self.cfg.save_path.display()
            );
            return Ok(());
        }
        if present < total {
            let missing: Vec<&str> = std::iter::once(("frontend", &frontend_latest))
                .chain(worker_latest.iter().map(|(name, latest)| (name.as_str(), latest)))
                .filter(|(_, latest)| latest.is_none())
                .map(|(name, _)| name)
                .collect();
            return Err(Error::Consistency(format!(
                "components {missing:?} have no checkpoint while others do; refusing partial resume"
            )));
        }

        let frontend_id = frontend_latest
            .ok_or_else(|| Error::Consistency("frontend checkpoint disappeared".to_string()))?;

        // All components present: their global steps must agree exactly
        let step = self.frontend_saver.load_ckpt_step(&frontend_id)?;
        for (name, latest) in &worker_latest {
            let id = latest.as_ref().ok_or_else(|| {
                Error::Consistency(format!("worker '{name}' checkpoint disappeared"))
            })?;
            let worker_step = self.frontend_saver.load_ckpt_step(id)?;
            if worker_step != step {
                return Err(Error::Consistency(format!(
                    "worker '{name}' checkpoint is at step {worker_step}, frontend is at {step}"
                )));
            }
        }

        let parts = self.model.parts();
        let path = self.frontend_saver.checkpoint_path(&frontend_id);
        self.frontend_saver.load_pretrained_ckpt(
            &path,
            true,
            parts.frontend.params(),
            self.frontend_optim.as_mut(),
        )?;

        for (worker, (name, latest)) in parts
            .classification
            .into_iter()
            .chain(parts.regression)
            .zip(worker_latest.iter())
        {
            if worker.name() != name {
                return Err(Error::Consistency(format!(
                    "worker order changed since checkpointing: expected '{name}', found '{}'",
                    worker.name()
                )));
            }
            let id = latest.as_ref().ok_or_else(|| {
                Error::Consistency(format!("worker '{name}' checkpoint disappeared"))
            })?;
            let slot = self
                .registry
                .get_mut(name)
                .ok_or_else(|| Error::Config(format!("worker '{name}' has no registry slot")))?;
            let path = slot.saver.checkpoint_path(id);
            slot.saver.load_pretrained_ckpt(
                &path,
                true,
                worker.params(),
                slot.optimizer.as_mut(),
            )?;
        }

        self.global_step = step;
        info!("resumed all components at global step {step}");
        Ok(())
    }
}
