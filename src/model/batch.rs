//! Batch data structure

use crate::Tensor;

/// One raw input chunk pulled from the data source
///
/// Labels are not carried here; the self-supervised model derives every
/// task's ground truth from the inputs during its forward pass.
#[derive(Clone)]
pub struct Batch {
    /// Raw input features
    pub inputs: Tensor,
}

impl Batch {
    /// Create a new batch
    pub fn new(inputs: Tensor) -> Self {
        Self { inputs }
    }

    /// Number of input elements
    pub fn size(&self) -> usize {
        self.inputs.len()
    }
}
