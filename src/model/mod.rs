//! Model collaborator contracts
//!
//! The training core does not define neural architectures. It drives any
//! model that exposes a shared frontend encoder plus named classification
//! and regression workers through the traits below. The [`linear`] module
//! provides a minimal implementation used by the CLI demo and the tests.

mod batch;
mod linear;

pub use batch::Batch;
pub use linear::{demo_batches, demo_model, LinearFrontend, LinearSpeechModel, LinearWorker};

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use ndarray::Array1;

use crate::{Error, Tensor};

/// Execution device designator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    /// Host CPU
    #[default]
    Cpu,
    /// CUDA device by ordinal
    Cuda(usize),
}

impl FromStr for Device {
    type Err = Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "cpu" => Ok(Device::Cpu),
            "cuda" => Ok(Device::Cuda(0)),
            other => match other.strip_prefix("cuda:").and_then(|n| n.parse().ok()) {
                Some(ordinal) => Ok(Device::Cuda(ordinal)),
                None => Err(Error::Config(format!("unknown device: {other}"))),
            },
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
        }
    }
}

/// Whether a worker predicts discrete labels or continuous targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Classification,
    Regression,
}

/// Output of one forward pass over a batch
///
/// `preds` and `labels` are keyed by worker name; the self-supervised model
/// derives labels from the batch itself.
pub struct ForwardPass {
    /// Shared hidden representation produced by the frontend
    pub hidden: Array1<f32>,
    /// The raw input chunk the pass was computed from
    pub chunk: Array1<f32>,
    /// Per-task predictions
    pub preds: BTreeMap<String, Array1<f32>>,
    /// Per-task ground truth
    pub labels: BTreeMap<String, Array1<f32>>,
}

/// A task-specific head consuming the shared hidden representation
pub trait Worker {
    /// Unique task name, used as the registry key everywhere
    fn name(&self) -> &str;

    /// The worker's own trainable parameters
    fn params(&mut self) -> &mut [Tensor];

    /// Scalar loss for one (prediction, label) pair
    fn loss(&self, pred: &Array1<f32>, label: &Array1<f32>) -> f32;

    /// Backward pass for this worker's full loss
    ///
    /// Writes gradients into the worker's own parameters and returns the
    /// gradient with respect to the shared hidden representation, which the
    /// backprop scheduler weights before handing it to the frontend.
    fn backward(&mut self, pred: &Array1<f32>, label: &Array1<f32>) -> Array1<f32>;
}

/// The shared trunk encoder
pub trait Frontend {
    /// The frontend's trainable parameters
    fn params(&mut self) -> &mut [Tensor];

    /// Accumulate a (weighted) hidden-representation gradient into the
    /// frontend's parameter gradients
    fn backward(&mut self, grad_hidden: &Array1<f32>);
}

/// Disjoint mutable borrows of a model's trainable pieces
pub struct ModelParts<'a> {
    pub frontend: &'a mut dyn Frontend,
    pub classification: Vec<&'a mut dyn Worker>,
    pub regression: Vec<&'a mut dyn Worker>,
}

/// Contract the trainer drives a model through
pub trait SpeechModel {
    /// Run the frontend and every worker over one batch
    fn forward(&mut self, batch: &Batch, device: Device) -> ForwardPass;

    /// Borrow the frontend and both worker lists at once
    fn parts(&mut self) -> ModelParts<'_>;

    /// Flip between training and evaluation behavior
    fn set_training(&mut self, training: bool);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_from_str() {
        assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
        assert_eq!("cuda".parse::<Device>().unwrap(), Device::Cuda(0));
        assert_eq!("cuda:2".parse::<Device>().unwrap(), Device::Cuda(2));
        assert!("tpu".parse::<Device>().is_err());
    }

    #[test]
    fn test_device_display_round_trip() {
        for device in [Device::Cpu, Device::Cuda(1)] {
            let shown = device.to_string();
            assert_eq!(shown.parse::<Device>().unwrap(), device);
        }
    }
}
