//! Epoch/batch driving loop

use std::collections::BTreeMap;
use std::fs;

use log::{debug, info};

use super::core::Trainer;
use crate::backprop::{LossBundle, TOTAL_KEY};
use crate::logging::{
    EvalSnapshot, TrainSnapshot, EVAL_SNAPSHOT_FILE, TRAIN_SNAPSHOT_FILE,
};
use crate::model::{Batch, Device, ForwardPass, SpeechModel, Worker};
use crate::trainer::registry::WorkerSlot;
use crate::{Error, Result};

/// Pull the next batch, restarting the source transparently on exhaustion
///
/// The restarted iterator begins at the source's first batch; nothing is
/// skipped or duplicated across the wrap boundary.
fn next_or_restart<I, F>(iterator: &mut I, restart: &mut F) -> Result<Batch>
where
    F: FnMut() -> I,
    I: Iterator<Item = Batch>,
{
    match iterator.next() {
        Some(batch) => Ok(batch),
        None => {
            *iterator = restart();
            iterator
                .next()
                .ok_or_else(|| Error::Config("data source yields no batches".to_string()))
        }
    }
}

impl<M: SpeechModel> Trainer<M> {
    /// Run the full training schedule
    ///
    /// `train_data` and `valid_data` are restartable batch sources: each
    /// call produces a fresh iterator over the same finite sequence.
    /// Every epoch runs `bpe` training batches, a `va_bpe`-batch evaluation
    /// pass, then persists all components at the epoch-end global step.
    pub fn train<Ft, It, Fv, Iv>(
        &mut self,
        mut train_data: Ft,
        mut valid_data: Fv,
        device: Device,
    ) -> Result<()>
    where
        Ft: FnMut() -> It,
        It: Iterator<Item = Batch>,
        Fv: FnMut() -> Iv,
        Iv: Iterator<Item = Batch>,
    {
        info!(
            "beginning training on {device}: {} epochs x {} batches, policy '{}'",
            self.cfg.epochs,
            self.cfg.bpe,
            self.backprop.mode()
        );

        // After a resume the completed epochs are implied by the step
        let start_epoch = (self.global_step / self.cfg.bpe as u64) as usize;

        for epoch in start_epoch..self.cfg.epochs {
            self.model.set_training(true);
            let mut iterator = train_data();

            for bidx in 1..=self.cfg.bpe {
                let batch = next_or_restart(&mut iterator, &mut train_data)?;

                let pass = self.model.forward(&batch, device);
                let losses = self.backprop.step(
                    self.model.parts(),
                    &pass,
                    &mut self.registry,
                    self.frontend_optim.as_mut(),
                    self.cfg.max_grad_norm,
                )?;

                if bidx % self.cfg.log_freq == 0 || bidx >= self.cfg.bpe {
                    let lrs = self.step_schedulers(bidx, epoch, &losses)?;
                    self.log_train(&pass, &losses, epoch, bidx, &lrs)?;
                }
            }

            self.evaluate(&mut valid_data, epoch, device)?;

            let step = ((epoch + 1) * self.cfg.bpe) as u64;
            self.save_all(step)?;
            self.global_step = step;
        }
        Ok(())
    }

    /// One full evaluation pass: `va_bpe` batches, no gradient work,
    /// per-task mean losses
    pub(crate) fn evaluate<Fv, Iv>(
        &mut self,
        valid_data: &mut Fv,
        epoch: usize,
        device: Device,
    ) -> Result<()>
    where
        Fv: FnMut() -> Iv,
        Iv: Iterator<Item = Batch>,
    {
        self.model.set_training(false);
        info!("beginning evaluation (epoch {epoch})");

        let mut running: BTreeMap<String, Vec<f32>> = BTreeMap::new();
        let mut iterator = valid_data();

        for _ in 1..=self.cfg.va_bpe {
            let batch = next_or_restart(&mut iterator, valid_data)?;
            let pass = self.model.forward(&batch, device);

            let parts = self.model.parts();
            for worker in parts.classification.iter().chain(parts.regression.iter()) {
                let name = worker.name();
                let pred = pass.preds.get(name).ok_or_else(|| {
                    Error::Model(format!("forward pass missing prediction for '{name}'"))
                })?;
                let label = pass.labels.get(name).ok_or_else(|| {
                    Error::Model(format!("forward pass missing label for '{name}'"))
                })?;
                running.entry(name.to_string()).or_default().push(worker.loss(pred, label));
            }
        }
        self.model.set_training(true);

        let means: BTreeMap<String, f32> = running
            .into_iter()
            .map(|(name, values)| {
                let mean = values.iter().sum::<f32>() / values.len().max(1) as f32;
                (name, mean)
            })
            .collect();
        for (name, mean) in &means {
            debug!("eval {name}: avg loss {mean:.4}");
        }

        match &mut self.sink {
            Some(sink) => {
                for (name, mean) in &means {
                    sink.scalar(&format!("eval/{name}_loss"), *mean, epoch as u64);
                }
            }
            None => {
                fs::create_dir_all(&self.cfg.save_path)?;
                crate::logging::write_snapshot(
                    &self.cfg.save_path.join(EVAL_SNAPSHOT_FILE),
                    &EvalSnapshot { epoch, losses: means },
                )?;
            }
        }
        Ok(())
    }

    /// Step every LR schedule with its task's latest loss
    ///
    /// The frontend schedule observes the combined total; each worker's
    /// schedule observes that worker's own loss. Returns the new rates
    /// keyed by component name.
    fn step_schedulers(
        &mut self,
        bidx: usize,
        epoch: usize,
        losses: &LossBundle,
    ) -> Result<BTreeMap<String, f32>> {
        let mut lrs = BTreeMap::new();
        lrs.insert(
            "frontend".to_string(),
            self.frontend_scheduler.step(
                self.frontend_optim.as_mut(),
                bidx,
                epoch,
                losses.total(),
            ),
        );

        for (name, slot) in self.registry.iter_mut() {
            let loss = losses
                .get(name)
                .ok_or_else(|| Error::Model(format!("loss bundle missing task '{name}'")))?;
            let WorkerSlot { scheduler, optimizer, .. } = slot;
            lrs.insert(name.to_string(), scheduler.step(optimizer.as_mut(), bidx, epoch, loss));
        }
        Ok(lrs)
    }

    /// Emit one training log record through the sink, or overwrite the
    /// fallback snapshot when no sink is attached
    fn log_train(
        &mut self,
        pass: &ForwardPass,
        losses: &LossBundle,
        epoch: usize,
        bidx: usize,
        lrs: &BTreeMap<String, f32>,
    ) -> Result<()> {
        let step = (epoch * self.cfg.bpe + bidx) as u64;
        info!("batch {bidx}/{} (epoch {epoch}) step {step}", self.cfg.bpe);
        for (name, loss) in losses.iter() {
            let lr_name = if name == TOTAL_KEY { "frontend" } else { name };
            if let Some(lr) = lrs.get(lr_name) {
                debug!("{name}: learning rate = {lr:.8}, loss = {loss:.4}");
            }
        }

        match &mut self.sink {
            Some(sink) => {
                for (name, loss) in losses.task_iter() {
                    sink.scalar(&format!("train/{name}_loss"), loss, step);
                    if let Some(pred) = pass.preds.get(name) {
                        sink.histogram(&format!("train/{name}"), &pred.to_vec(), step);
                    }
                    if let Some(label) = pass.labels.get(name) {
                        sink.histogram(&format!("train/gtruth_{name}"), &label.to_vec(), step);
                    }
                }
            }
            None => {
                fs::create_dir_all(&self.cfg.save_path)?;
                let snapshot = TrainSnapshot {
                    step,
                    losses: losses.clone(),
                    dist: pass.preds.iter().map(|(k, v)| (k.clone(), v.to_vec())).collect(),
                    dist_gt: pass.labels.iter().map(|(k, v)| (k.clone(), v.to_vec())).collect(),
                };
                crate::logging::write_snapshot(
                    &self.cfg.save_path.join(TRAIN_SNAPSHOT_FILE),
                    &snapshot,
                )?;
            }
        }
        Ok(())
    }
}
