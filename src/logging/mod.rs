//! Metric logging sinks
//!
//! The trainer emits scalar and histogram records through the [`LogSink`]
//! trait; any visualization backend plugs in behind it. When no sink is
//! attached, the trainer falls back to overwriting fixed-name JSON
//! snapshots of the latest loss bundle for crash inspection.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::backprop::LossBundle;
use crate::checkpoint::write_json_atomic;
use crate::Result;

/// Destination for training metrics
pub trait LogSink {
    /// Record a scalar value under a tag at a global step
    fn scalar(&mut self, tag: &str, value: f32, step: u64);

    /// Record a value distribution under a tag at a global step
    fn histogram(&mut self, tag: &str, values: &[f32], step: u64);
}

/// A recorded scalar
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarRecord {
    pub tag: String,
    pub value: f32,
    pub step: u64,
}

/// A recorded histogram
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramRecord {
    pub tag: String,
    pub values: Vec<f32>,
    pub step: u64,
}

/// In-memory sink for tests and inspection
#[derive(Debug, Default)]
pub struct MemorySink {
    pub scalars: Vec<ScalarRecord>,
    pub histograms: Vec<HistogramRecord>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All scalar values recorded under `tag`, in order
    pub fn scalar_values(&self, tag: &str) -> Vec<f32> {
        self.scalars.iter().filter(|r| r.tag == tag).map(|r| r.value).collect()
    }
}

impl LogSink for MemorySink {
    fn scalar(&mut self, tag: &str, value: f32, step: u64) {
        self.scalars.push(ScalarRecord { tag: tag.to_string(), value, step });
    }

    fn histogram(&mut self, tag: &str, values: &[f32], step: u64) {
        self.histograms.push(HistogramRecord {
            tag: tag.to_string(),
            values: values.to_vec(),
            step,
        });
    }
}

/// Shared-handle sink: lets a caller keep inspecting records after handing
/// the sink to a trainer
impl LogSink for std::sync::Arc<std::sync::Mutex<MemorySink>> {
    fn scalar(&mut self, tag: &str, value: f32, step: u64) {
        if let Ok(mut sink) = self.lock() {
            sink.scalar(tag, value, step);
        }
    }

    fn histogram(&mut self, tag: &str, values: &[f32], step: u64) {
        if let Ok(mut sink) = self.lock() {
            sink.histogram(tag, values, step);
        }
    }
}

/// Sink-less fallback snapshot of the latest training step
///
/// Overwritten in place every time; exists only so a crashed run leaves
/// its last state behind for inspection.
#[derive(Debug, Serialize)]
pub struct TrainSnapshot {
    pub step: u64,
    pub losses: LossBundle,
    pub dist: BTreeMap<String, Vec<f32>>,
    pub dist_gt: BTreeMap<String, Vec<f32>>,
}

/// Sink-less fallback snapshot of the latest evaluation pass
#[derive(Debug, Serialize)]
pub struct EvalSnapshot {
    pub epoch: usize,
    pub losses: BTreeMap<String, f32>,
}

/// File name of the training fallback snapshot
pub const TRAIN_SNAPSHOT_FILE: &str = "train_snapshot.json";

/// File name of the evaluation fallback snapshot
pub const EVAL_SNAPSHOT_FILE: &str = "valid_snapshot.json";

/// Overwrite a snapshot file atomically
pub fn write_snapshot<T: Serialize>(path: &Path, snapshot: &T) -> Result<()> {
    write_json_atomic(path, snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_sink_records() {
        let mut sink = MemorySink::new();
        sink.scalar("train/mi_loss", 0.5, 10);
        sink.scalar("train/mi_loss", 0.4, 20);
        sink.histogram("train/mi", &[1.0, 2.0], 10);

        assert_eq!(sink.scalar_values("train/mi_loss"), vec![0.5, 0.4]);
        assert_eq!(sink.histograms.len(), 1);
        assert_eq!(sink.histograms[0].values, vec![1.0, 2.0]);
    }

    #[test]
    fn test_snapshot_overwrites_not_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(TRAIN_SNAPSHOT_FILE);

        let mut losses = LossBundle::new();
        losses.insert("mi", 0.5);
        losses.set_total(0.5);

        for step in [1u64, 2, 3] {
            let snapshot = TrainSnapshot {
                step,
                losses: losses.clone(),
                dist: BTreeMap::new(),
                dist_gt: BTreeMap::new(),
            };
            write_snapshot(&path, &snapshot).unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"step\": 3"));
        assert!(!content.contains("\"step\": 1"));
    }

    #[test]
    fn test_eval_snapshot_serializes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(EVAL_SNAPSHOT_FILE);

        let mut losses = BTreeMap::new();
        losses.insert("chunk".to_string(), 0.25);
        write_snapshot(&path, &EvalSnapshot { epoch: 2, losses }).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("chunk"));
    }
}
