//! Tests for the backprop scheduler

use super::*;
use crate::checkpoint::Saver;
use crate::model::{
    demo_batches, demo_model, Device, Frontend, LinearSpeechModel, SpeechModel, TaskKind, Worker,
};
use crate::optim::{Optimizer, PolyLR, SGD};
use crate::trainer::{WorkerRegistry, WorkerSlot};
use approx::assert_abs_diff_eq;
use tempfile::TempDir;

const DIM: usize = 8;

fn registry_for(model: &mut LinearSpeechModel, dir: &std::path::Path) -> WorkerRegistry {
    let mut registry = WorkerRegistry::new();
    let parts = model.parts();
    let workers = parts
        .classification
        .iter()
        .map(|w| (w.name().to_string(), TaskKind::Classification))
        .chain(parts.regression.iter().map(|w| (w.name().to_string(), TaskKind::Regression)));
    for (name, kind) in workers {
        let slot = WorkerSlot {
            kind,
            optimizer: Box::new(SGD::new(0.01, 0.0)),
            scheduler: PolyLR::new(&name, 0.01, 2, 10).unwrap(),
            saver: Saver::new(dir, format!("M-{name}-"), 3).unwrap(),
        };
        registry.insert(name, slot).unwrap();
    }
    registry
}

fn worker_weights(model: &mut LinearSpeechModel) -> Vec<Vec<f32>> {
    let parts = model.parts();
    parts
        .classification
        .into_iter()
        .chain(parts.regression)
        .map(|w| w.params()[0].data().to_vec())
        .collect()
}

fn frontend_weights(model: &mut LinearSpeechModel) -> Vec<f32> {
    model.parts().frontend.params()[0].data().to_vec()
}

fn one_step(
    model: &mut LinearSpeechModel,
    registry: &mut WorkerRegistry,
    frontend_optim: &mut dyn Optimizer,
    scheduler: &mut BackpropScheduler,
) -> LossBundle {
    let batch = &demo_batches(DIM, 1)[0];
    let pass = model.forward(batch, Device::Cpu);
    scheduler.step(model.parts(), &pass, registry, frontend_optim, None).unwrap()
}

#[test]
fn test_plain_bundle_has_all_task_keys_plus_total() {
    let dir = TempDir::new().unwrap();
    let mut model = demo_model(DIM);
    let mut registry = registry_for(&mut model, dir.path());
    let mut frontend_optim = SGD::new(0.01, 0.0);
    let mut scheduler = BackpropScheduler::from_mode(&BackpropMode::Plain, None).unwrap();

    let bundle = one_step(&mut model, &mut registry, &mut frontend_optim, &mut scheduler);

    assert_eq!(bundle.len(), 5);
    for name in ["mi", "spc", "chunk", "mfcc", TOTAL_KEY] {
        assert!(bundle.get(name).is_some(), "bundle missing '{name}'");
    }
}

#[test]
fn test_plain_total_is_exact_sum() {
    let dir = TempDir::new().unwrap();
    let mut model = demo_model(DIM);
    let mut registry = registry_for(&mut model, dir.path());
    let mut frontend_optim = SGD::new(0.01, 0.0);
    let mut scheduler = BackpropScheduler::from_mode(&BackpropMode::Plain, None).unwrap();

    let bundle = one_step(&mut model, &mut registry, &mut frontend_optim, &mut scheduler);

    let sum: f32 = bundle.task_iter().map(|(_, loss)| loss).sum();
    assert_abs_diff_eq!(bundle.total(), sum, epsilon = 1e-5);
}

#[test]
fn test_plain_updates_frontend_and_workers() {
    let dir = TempDir::new().unwrap();
    let mut model = demo_model(DIM);
    let mut registry = registry_for(&mut model, dir.path());
    let mut frontend_optim = SGD::new(0.01, 0.0);
    let mut scheduler = BackpropScheduler::from_mode(&BackpropMode::Plain, None).unwrap();

    let frontend_before = frontend_weights(&mut model);
    let workers_before = worker_weights(&mut model);

    one_step(&mut model, &mut registry, &mut frontend_optim, &mut scheduler);

    assert_ne!(frontend_weights(&mut model), frontend_before);
    for (before, after) in workers_before.iter().zip(worker_weights(&mut model)) {
        assert_ne!(&after, before, "worker parameters did not move");
    }
}

/// Weight policy that excludes every task, for exercising the gating path
struct ExcludeAll;

impl WeightPolicy for ExcludeAll {
    fn name(&self) -> &'static str {
        "exclude_all"
    }

    fn weights(&mut self, losses: &[f32]) -> Vec<f32> {
        vec![0.0; losses.len()]
    }
}

#[test]
fn test_excluded_workers_still_update_their_own_params() {
    let dir = TempDir::new().unwrap();
    let mut model = demo_model(DIM);
    let mut registry = registry_for(&mut model, dir.path());
    let mut frontend_optim = SGD::new(0.01, 0.0);
    let mut scheduler = BackpropScheduler::new(Box::new(ExcludeAll));

    let frontend_before = frontend_weights(&mut model);
    let workers_before = worker_weights(&mut model);

    let bundle = one_step(&mut model, &mut registry, &mut frontend_optim, &mut scheduler);

    // No task contributed to the trunk, so it must not move and the
    // combined total is zero
    assert_eq!(frontend_weights(&mut model), frontend_before);
    assert_abs_diff_eq!(bundle.total(), 0.0, epsilon = 1e-7);

    // But every worker still took its own full-loss step
    for (before, after) in workers_before.iter().zip(worker_weights(&mut model)) {
        assert_ne!(&after, before, "excluded worker must still update itself");
    }
}

#[test]
fn test_dropout_mode_workers_update_every_step() {
    let dir = TempDir::new().unwrap();
    let mut model = demo_model(DIM);
    let mut registry = registry_for(&mut model, dir.path());
    let mut frontend_optim = SGD::new(0.01, 0.0);
    let mut scheduler =
        BackpropScheduler::from_mode(&BackpropMode::Dropout { dropout_rate: 0.5 }, Some(3))
            .unwrap();

    for _ in 0..5 {
        let workers_before = worker_weights(&mut model);
        one_step(&mut model, &mut registry, &mut frontend_optim, &mut scheduler);
        for (before, after) in workers_before.iter().zip(worker_weights(&mut model)) {
            assert_ne!(&after, before, "worker skipped its own update");
        }
    }
}

#[test]
fn test_softmax_total_is_weighted_sum() {
    let dir = TempDir::new().unwrap();
    let mut model = demo_model(DIM);
    let mut registry = registry_for(&mut model, dir.path());
    let mut frontend_optim = SGD::new(0.01, 0.0);
    let mut scheduler =
        BackpropScheduler::from_mode(&BackpropMode::Softmax { temperature: 1.0 }, None).unwrap();

    let bundle = one_step(&mut model, &mut registry, &mut frontend_optim, &mut scheduler);

    // Weights sum to 1, so the weighted total is a convex combination:
    // strictly inside the per-task loss range
    let losses: Vec<f32> = bundle.task_iter().map(|(_, loss)| loss).collect();
    let min = losses.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = losses.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    assert!(bundle.total() >= min - 1e-6 && bundle.total() <= max + 1e-6);
}

#[test]
fn test_missing_registry_slot_is_config_error() {
    let dir = TempDir::new().unwrap();
    let mut model = demo_model(DIM);
    let full = registry_for(&mut model, dir.path());
    let mut frontend_optim = SGD::new(0.01, 0.0);
    let mut scheduler = BackpropScheduler::from_mode(&BackpropMode::Plain, None).unwrap();

    // A registry missing one worker violates the key-set invariant
    let mut partial = WorkerRegistry::new();
    for (name, _) in full.iter() {
        if name == "mfcc" {
            continue;
        }
        let slot = WorkerSlot {
            kind: TaskKind::Regression,
            optimizer: Box::new(SGD::new(0.01, 0.0)),
            scheduler: PolyLR::new(name, 0.01, 2, 10).unwrap(),
            saver: Saver::new(dir.path(), format!("X-{name}-"), 3).unwrap(),
        };
        partial.insert(name.to_string(), slot).unwrap();
    }

    let batch = &demo_batches(DIM, 1)[0];
    let pass = model.forward(batch, Device::Cpu);
    let result =
        scheduler.step(model.parts(), &pass, &mut partial, &mut frontend_optim, None);
    assert!(matches!(result, Err(crate::Error::Config(_))));
}

#[test]
fn test_missing_prediction_is_model_error() {
    let dir = TempDir::new().unwrap();
    let mut model = demo_model(DIM);
    let mut registry = registry_for(&mut model, dir.path());
    let mut frontend_optim = SGD::new(0.01, 0.0);
    let mut scheduler = BackpropScheduler::from_mode(&BackpropMode::Plain, None).unwrap();

    let batch = &demo_batches(DIM, 1)[0];
    let mut pass = model.forward(batch, Device::Cpu);
    pass.preds.remove("spc");

    let result =
        scheduler.step(model.parts(), &pass, &mut registry, &mut frontend_optim, None);
    assert!(matches!(result, Err(crate::Error::Model(_))));
}

#[test]
fn test_mode_names() {
    assert_eq!(
        BackpropScheduler::from_mode(&BackpropMode::Plain, None).unwrap().mode(),
        "plain"
    );
    assert_eq!(
        BackpropScheduler::from_mode(&BackpropMode::Adaptive { temperature: 1.0, alpha: 0.5 }, None)
            .unwrap()
            .mode(),
        "adaptive"
    );
}

#[test]
fn test_loss_bundle_accessors() {
    let mut bundle = LossBundle::new();
    assert!(bundle.is_empty());

    bundle.insert("mi", 0.5);
    bundle.insert("chunk", 1.5);
    bundle.set_total(2.0);

    assert_eq!(bundle.len(), 3);
    assert_eq!(bundle.get("mi"), Some(0.5));
    assert_abs_diff_eq!(bundle.total(), 2.0, epsilon = 1e-7);
    assert_eq!(bundle.task_iter().count(), 2);

    // Deterministic name-sorted iteration
    let names: Vec<&str> = bundle.iter().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["chunk", "mi", "total"]);
}
