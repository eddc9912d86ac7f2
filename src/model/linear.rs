//! Minimal linear model fixtures
//!
//! An elementwise-linear frontend and worker family implementing the
//! collaborator traits with real gradient flow. Used by the CLI demo and the
//! tests; stands in for the actual speech encoder, which lives outside this
//! crate.

use ndarray::Array1;

use super::{Batch, Device, ForwardPass, Frontend, ModelParts, SpeechModel, TaskKind, Worker};
use crate::Tensor;

/// Elementwise-linear trunk: `hidden_i = w_i * x_i`
pub struct LinearFrontend {
    weight: Tensor,
    last_input: Option<Array1<f32>>,
}

impl LinearFrontend {
    /// Create a frontend with identity-initialized weights
    pub fn new(dim: usize) -> Self {
        Self { weight: Tensor::from_vec(vec![1.0; dim], true), last_input: None }
    }

    /// Run the frontend over one input chunk
    pub fn forward(&mut self, inputs: &Array1<f32>) -> Array1<f32> {
        self.last_input = Some(inputs.clone());
        self.weight.data() * inputs
    }
}

impl Frontend for LinearFrontend {
    fn params(&mut self) -> &mut [Tensor] {
        std::slice::from_mut(&mut self.weight)
    }

    fn backward(&mut self, grad_hidden: &Array1<f32>) {
        if let Some(input) = &self.last_input {
            self.weight.accumulate_grad(&(grad_hidden * input));
        }
    }
}

/// Elementwise-linear head: `pred_i = v_i * hidden_i`
///
/// Classification workers interpret predictions as logits against binary
/// labels derived from the input sign (binary cross-entropy); regression
/// workers fit an affine transform of the input (mean squared error).
pub struct LinearWorker {
    name: String,
    kind: TaskKind,
    weight: Tensor,
    last_hidden: Option<Array1<f32>>,
    label_scale: f32,
    label_shift: f32,
}

impl LinearWorker {
    /// Create a classification worker; labels are `1` where
    /// `scale * x + shift > 0`
    pub fn classification(name: impl Into<String>, dim: usize, scale: f32, shift: f32) -> Self {
        Self {
            name: name.into(),
            kind: TaskKind::Classification,
            weight: Tensor::from_vec(vec![0.5; dim], true),
            last_hidden: None,
            label_scale: scale,
            label_shift: shift,
        }
    }

    /// Create a regression worker; targets are `scale * x + shift`
    pub fn regression(name: impl Into<String>, dim: usize, scale: f32, shift: f32) -> Self {
        Self {
            name: name.into(),
            kind: TaskKind::Regression,
            weight: Tensor::from_vec(vec![0.5; dim], true),
            last_hidden: None,
            label_scale: scale,
            label_shift: shift,
        }
    }

    /// The kind of task this worker solves
    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Predict from the shared hidden representation, remembering it for the
    /// backward pass
    pub fn predict(&mut self, hidden: &Array1<f32>) -> Array1<f32> {
        self.last_hidden = Some(hidden.clone());
        self.weight.data() * hidden
    }

    /// Derive this task's self-supervised target from the raw inputs
    pub fn derive_label(&self, inputs: &Array1<f32>) -> Array1<f32> {
        let affine = inputs * self.label_scale + self.label_shift;
        match self.kind {
            TaskKind::Classification => affine.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            TaskKind::Regression => affine,
        }
    }

    /// Per-element loss gradient with respect to the prediction
    fn grad_pred(&self, pred: &Array1<f32>, label: &Array1<f32>) -> Array1<f32> {
        let n = pred.len().max(1) as f32;
        match self.kind {
            // d BCE-with-logits / dz = sigmoid(z) - y
            TaskKind::Classification => {
                (pred.mapv(|z| 1.0 / (1.0 + (-z).exp())) - label) / n
            }
            // d MSE / dp = 2 (p - y)
            TaskKind::Regression => (pred - label) * (2.0 / n),
        }
    }
}

impl Worker for LinearWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn params(&mut self) -> &mut [Tensor] {
        std::slice::from_mut(&mut self.weight)
    }

    fn loss(&self, pred: &Array1<f32>, label: &Array1<f32>) -> f32 {
        let n = pred.len().max(1) as f32;
        match self.kind {
            TaskKind::Classification => {
                // Numerically stable BCE with logits:
                // ln(1 + e^z) - y*z  ==  max(z, 0) - y*z + ln(1 + e^-|z|)
                pred.iter()
                    .zip(label.iter())
                    .map(|(&z, &y)| z.max(0.0) - y * z + (1.0 + (-z.abs()).exp()).ln())
                    .sum::<f32>()
                    / n
            }
            TaskKind::Regression => {
                pred.iter().zip(label.iter()).map(|(&p, &y)| (p - y) * (p - y)).sum::<f32>() / n
            }
        }
    }

    fn backward(&mut self, pred: &Array1<f32>, label: &Array1<f32>) -> Array1<f32> {
        let grad_pred = self.grad_pred(pred, label);
        match &self.last_hidden {
            Some(hidden) => {
                self.weight.accumulate_grad(&(&grad_pred * hidden));
                &grad_pred * self.weight.data()
            }
            None => Array1::zeros(pred.len()),
        }
    }
}

/// A frontend plus named classification and regression workers
pub struct LinearSpeechModel {
    frontend: LinearFrontend,
    classification: Vec<LinearWorker>,
    regression: Vec<LinearWorker>,
    training: bool,
}

impl LinearSpeechModel {
    /// Assemble a model from explicit worker lists
    pub fn new(
        frontend: LinearFrontend,
        classification: Vec<LinearWorker>,
        regression: Vec<LinearWorker>,
    ) -> Self {
        Self { frontend, classification, regression, training: true }
    }

    /// Whether the model is currently in training mode
    pub fn is_training(&self) -> bool {
        self.training
    }
}

impl SpeechModel for LinearSpeechModel {
    fn forward(&mut self, batch: &Batch, _device: Device) -> ForwardPass {
        let inputs = batch.inputs.data();
        let hidden = self.frontend.forward(inputs);

        let mut preds = std::collections::BTreeMap::new();
        let mut labels = std::collections::BTreeMap::new();
        for worker in self.classification.iter_mut().chain(self.regression.iter_mut()) {
            preds.insert(worker.name().to_string(), worker.predict(&hidden));
            labels.insert(worker.name().to_string(), worker.derive_label(inputs));
        }

        ForwardPass { hidden, chunk: inputs.clone(), preds, labels }
    }

    fn parts(&mut self) -> ModelParts<'_> {
        ModelParts {
            frontend: &mut self.frontend,
            classification: self
                .classification
                .iter_mut()
                .map(|w| w as &mut dyn Worker)
                .collect(),
            regression: self.regression.iter_mut().map(|w| w as &mut dyn Worker).collect(),
        }
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }
}

/// The default demo model: classification workers `mi`/`spc`, regression
/// workers `chunk`/`mfcc`
pub fn demo_model(dim: usize) -> LinearSpeechModel {
    LinearSpeechModel::new(
        LinearFrontend::new(dim),
        vec![
            LinearWorker::classification("mi", dim, 1.0, 0.0),
            LinearWorker::classification("spc", dim, 1.0, -0.5),
        ],
        vec![
            LinearWorker::regression("chunk", dim, 1.0, 0.0),
            LinearWorker::regression("mfcc", dim, 0.5, 0.1),
        ],
    )
}

/// Deterministic synthetic batches for the demo and the tests
pub fn demo_batches(dim: usize, count: usize) -> Vec<Batch> {
    (0..count)
        .map(|i| {
            let inputs: Vec<f32> =
                (0..dim).map(|j| ((i * dim + j) as f32 * 0.37).sin()).collect();
            Batch::new(Tensor::from_vec(inputs, false))
        })
        .collect()
}
