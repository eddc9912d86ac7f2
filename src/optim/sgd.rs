//! Stochastic Gradient Descent optimizer

use ndarray::Array1;

use super::optimizer::{buffers_from_state, buffers_to_state, state_kind_mismatch};
use super::{OptimState, Optimizer};
use crate::{Result, Tensor};

/// SGD optimizer with optional momentum
#[derive(Debug)]
pub struct SGD {
    lr: f32,
    momentum: f32,
    velocities: Vec<Option<Array1<f32>>>,
}

impl SGD {
    /// Create a new SGD optimizer
    pub fn new(lr: f32, momentum: f32) -> Self {
        Self { lr, momentum, velocities: Vec::new() }
    }

    /// Initialize velocities if needed
    fn ensure_velocities(&mut self, params: &[Tensor]) {
        if self.velocities.is_empty() {
            self.velocities = params.iter().map(|_| None).collect();
        }
    }
}

impl Optimizer for SGD {
    fn step(&mut self, params: &mut [Tensor]) {
        self.ensure_velocities(params);

        for (i, param) in params.iter_mut().enumerate() {
            if let Some(grad) = param.grad().cloned() {
                if self.momentum > 0.0 {
                    // v = momentum * v - lr * grad
                    let velocity = match &self.velocities[i] {
                        Some(v) => v * self.momentum - &grad * self.lr,
                        None => &grad * (-self.lr),
                    };
                    *param.data_mut() += &velocity;
                    self.velocities[i] = Some(velocity);
                } else {
                    // param -= lr * grad
                    *param.data_mut() -= &(&grad * self.lr);
                }
            }
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }

    fn state(&self) -> OptimState {
        OptimState::Sgd {
            lr: self.lr,
            momentum: self.momentum,
            velocities: buffers_to_state(&self.velocities),
        }
    }

    fn load_state(&mut self, state: OptimState) -> Result<()> {
        match state {
            OptimState::Sgd { lr, momentum, velocities } => {
                self.lr = lr;
                self.momentum = momentum;
                self.velocities = buffers_from_state(velocities);
                Ok(())
            }
            other => Err(state_kind_mismatch("sgd", &other)),
        }
    }
}
