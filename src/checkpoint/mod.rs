//! Per-component checkpoint persistence
//!
//! Every component (the frontend and each worker) gets its own [`Saver`]
//! sharing one save directory, namespaced by a component prefix. A
//! checkpoint bundles weights, optimizer state and the global step; files
//! are written with a temp-file + atomic-rename discipline so a partial
//! write can never surface as a valid latest checkpoint.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::optim::{OptimState, Optimizer};
use crate::{Error, Result, Tensor};

const WEIGHTS_FILE_PREFIX: &str = "weights_";

/// Serialized state of one component at a global step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// Global step the whole model was at when this was written
    pub step: u64,
    /// Parameter buffers in declaration order
    pub weights: Vec<Vec<f32>>,
    /// Optimizer internals
    pub optimizer: OptimState,
}

/// Serialize `value` as JSON to `path` via a temp file and atomic rename
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| Error::Serialization(format!("JSON serialization failed: {e}")))?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Checkpoint reader/writer for one component
pub struct Saver {
    save_path: PathBuf,
    prefix: String,
    max_ckpts: usize,
}

impl Saver {
    /// Create a saver writing under `save_path` with a component `prefix`
    /// (e.g. `"FE-"` or `"M-mfcc-"`), retaining at most `max_ckpts`
    /// checkpoints
    pub fn new(
        save_path: impl Into<PathBuf>,
        prefix: impl Into<String>,
        max_ckpts: usize,
    ) -> Result<Self> {
        let prefix = prefix.into();
        if max_ckpts == 0 {
            return Err(Error::Config(format!(
                "saver '{prefix}' needs max_ckpts >= 1"
            )));
        }
        Ok(Self { save_path: save_path.into(), prefix, max_ckpts })
    }

    /// Component prefix this saver namespaces its files with
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Persist weights + optimizer state at `step`
    ///
    /// Returns the checkpoint identifier. Prunes oldest-first down to the
    /// retention limit afterwards.
    pub fn save(
        &self,
        label: &str,
        step: u64,
        params: &[Tensor],
        optimizer: &dyn Optimizer,
    ) -> Result<String> {
        fs::create_dir_all(&self.save_path)?;

        let record = CheckpointRecord {
            step,
            weights: params.iter().map(|p| p.data().to_vec()).collect(),
            optimizer: optimizer.state(),
        };

        let id = format!("{label}-{step}.json");
        write_json_atomic(&self.save_path.join(format!("{WEIGHTS_FILE_PREFIX}{id}")), &record)?;
        self.prune()?;
        Ok(id)
    }

    /// Identifier of the most recent checkpoint, or `None` if this
    /// component has never been saved
    pub fn read_latest_checkpoint(&self) -> Option<String> {
        self.list_checkpoints()
            .into_iter()
            .max_by_key(|(step, _)| *step)
            .map(|(_, id)| id)
    }

    /// Extract the global step recorded in a checkpoint identifier
    pub fn load_ckpt_step(&self, state: &str) -> Result<u64> {
        state
            .strip_suffix(".json")
            .and_then(|stem| stem.rsplit_once('-'))
            .and_then(|(_, step)| step.parse().ok())
            .ok_or_else(|| {
                Error::Consistency(format!("cannot parse step from checkpoint id '{state}'"))
            })
    }

    /// Restore weights (and optimizer state when `load_last`) from a
    /// checkpoint file
    ///
    /// Returns the global step recorded in the checkpoint.
    pub fn load_pretrained_ckpt(
        &self,
        path: &Path,
        load_last: bool,
        params: &mut [Tensor],
        optimizer: &mut dyn Optimizer,
    ) -> Result<u64> {
        let json = fs::read_to_string(path)?;
        let record: CheckpointRecord = serde_json::from_str(&json)
            .map_err(|e| Error::Serialization(format!("checkpoint parse failed: {e}")))?;

        if record.weights.len() != params.len() {
            return Err(Error::Consistency(format!(
                "checkpoint '{}' holds {} weight buffers, component has {} parameters",
                path.display(),
                record.weights.len(),
                params.len()
            )));
        }
        for (i, (weights, param)) in record.weights.iter().zip(params.iter()).enumerate() {
            if weights.len() != param.len() {
                return Err(Error::Consistency(format!(
                    "checkpoint '{}' weight buffer {i} has length {}, expected {}",
                    path.display(),
                    weights.len(),
                    param.len()
                )));
            }
        }

        for (weights, param) in record.weights.into_iter().zip(params.iter_mut()) {
            *param.data_mut() = ndarray::Array1::from_vec(weights);
        }
        if load_last {
            optimizer.load_state(record.optimizer)?;
        }
        Ok(record.step)
    }

    /// Absolute path of a checkpoint file from its identifier
    pub fn checkpoint_path(&self, id: &str) -> PathBuf {
        self.save_path.join(format!("{WEIGHTS_FILE_PREFIX}{id}"))
    }

    /// All of this component's checkpoints as (step, id), unsorted
    fn list_checkpoints(&self) -> Vec<(u64, String)> {
        let Ok(entries) = fs::read_dir(&self.save_path) else {
            return Vec::new();
        };
        let mut found = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(id) = name.strip_prefix(WEIGHTS_FILE_PREFIX) else { continue };
            if !id.starts_with(&self.prefix) || !id.ends_with(".json") {
                continue;
            }
            if let Ok(step) = self.load_ckpt_step(id) {
                found.push((step, id.to_string()));
            }
        }
        found
    }

    /// Remove oldest checkpoints beyond the retention limit, FIFO by step
    fn prune(&self) -> Result<()> {
        let mut checkpoints = self.list_checkpoints();
        checkpoints.sort_by_key(|(step, _)| *step);
        while checkpoints.len() > self.max_ckpts {
            let (_, id) = checkpoints.remove(0);
            fs::remove_file(self.checkpoint_path(&id))?;
        }
        Ok(())
    }
}
