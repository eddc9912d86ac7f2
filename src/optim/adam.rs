//! Adam optimizer

use ndarray::Array1;

use super::optimizer::{buffers_from_state, buffers_to_state, state_kind_mismatch};
use super::{OptimState, Optimizer};
use crate::{Result, Tensor};

/// Adam optimizer with bias-corrected first and second moments
///
/// Update rule:
///   m_t = beta1 * m_{t-1} + (1 - beta1) * g
///   v_t = beta2 * v_{t-1} + (1 - beta2) * g^2
///   theta_t = theta_{t-1} - lr_t * m_t / (sqrt(v_t) + epsilon)
/// with lr_t = lr * sqrt(1 - beta2^t) / (1 - beta1^t).
#[derive(Debug)]
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    t: u64,
    m: Vec<Option<Array1<f32>>>,
    v: Vec<Option<Array1<f32>>>,
}

impl Adam {
    /// Create a new Adam optimizer
    pub fn new(lr: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self { lr, beta1, beta2, epsilon, t: 0, m: Vec::new(), v: Vec::new() }
    }

    /// Create Adam with the standard defaults (0.9, 0.999, 1e-8)
    pub fn default_params(lr: f32) -> Self {
        Self::new(lr, 0.9, 0.999, 1e-8)
    }

    /// Optimizer step counter
    pub fn step_count(&self) -> u64 {
        self.t
    }

    /// Initialize moments if needed
    fn ensure_moments(&mut self, params: &[Tensor]) {
        if self.m.is_empty() {
            self.m = params.iter().map(|_| None).collect();
            self.v = params.iter().map(|_| None).collect();
        }
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut [Tensor]) {
        self.ensure_moments(params);
        self.t += 1;

        // Bias correction folded into the step size
        let lr_t = self.lr
            * ((1.0 - self.beta2.powi(self.t as i32)).sqrt()
                / (1.0 - self.beta1.powi(self.t as i32)));

        let (beta1, beta2) = (self.beta1, self.beta2);
        for (i, param) in params.iter_mut().enumerate() {
            if let Some(grad) = param.grad().cloned() {
                if self.m[i].is_none() {
                    self.m[i] = Some(Array1::zeros(grad.len()));
                    self.v[i] = Some(Array1::zeros(grad.len()));
                }
                if let Some(m) = self.m[i].as_mut() {
                    *m = &*m * beta1 + &grad * (1.0 - beta1);
                }
                if let Some(v) = self.v[i].as_mut() {
                    *v = &*v * beta2 + &grad.mapv(|g| g * g) * (1.0 - beta2);
                }
                if let (Some(m), Some(v)) = (&self.m[i], &self.v[i]) {
                    let update = m / &(v.mapv(f32::sqrt) + self.epsilon) * lr_t;
                    *param.data_mut() -= &update;
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
        OptimState::Adam {
            lr: self.lr,
            beta1: self.beta1,
            beta2: self.beta2,
            epsilon: self.epsilon,
            t: self.t,
            m: buffers_to_state(&self.m),
            v: buffers_to_state(&self.v),
        }
    }

    fn load_state(&mut self, state: OptimState) -> Result<()> {
        match state {
            OptimState::Adam { lr, beta1, beta2, epsilon, t, m, v } => {
                self.lr = lr;
                self.beta1 = beta1;
                self.beta2 = beta2;
                self.epsilon = epsilon;
                self.t = t;
                self.m = buffers_from_state(m);
                self.v = buffers_from_state(v);
                Ok(())
            }
            other => Err(state_kind_mismatch("adam", &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr1;

    #[test]
    fn test_adam_first_step() {
        let mut opt = Adam::default_params(0.001);
        let mut param = Tensor::from_vec(vec![1.0], true);
        param.set_grad(arr1(&[1.0]));

        opt.step(std::slice::from_mut(&mut param));

        // First step moves by ~lr regardless of gradient scale
        assert_abs_diff_eq!(param.data()[0], 1.0 - 0.001, epsilon = 1e-5);
        assert_eq!(opt.step_count(), 1);
    }

    #[test]
    fn test_adam_descends_quadratic() {
        let mut opt = Adam::default_params(0.1);
        let mut param = Tensor::from_vec(vec![5.0], true);

        for _ in 0..200 {
            // d/dx of (x - 2)^2
            let grad = 2.0 * (param.data()[0] - 2.0);
            param.set_grad(arr1(&[grad]));
            opt.step(std::slice::from_mut(&mut param));
        }

        assert_abs_diff_eq!(param.data()[0], 2.0, epsilon = 0.1);
    }

    #[test]
    fn test_adam_state_round_trip_continues_trajectory() {
        let mut reference = Adam::default_params(0.01);
        let mut param_a = Tensor::from_vec(vec![1.0], true);
        param_a.set_grad(arr1(&[0.5]));
        reference.step(std::slice::from_mut(&mut param_a));

        let mut restored = Adam::default_params(0.9);
        restored.load_state(reference.state()).unwrap();
        assert_eq!(restored.step_count(), 1);

        let mut param_b = param_a.clone();
        param_a.set_grad(arr1(&[0.5]));
        param_b.set_grad(arr1(&[0.5]));
        reference.step(std::slice::from_mut(&mut param_a));
        restored.step(std::slice::from_mut(&mut param_b));

        assert_abs_diff_eq!(param_a.data()[0], param_b.data()[0], epsilon = 1e-7);
    }

    #[test]
    fn test_adam_rejects_sgd_state() {
        let mut opt = Adam::default_params(0.001);
        let state = OptimState::Sgd { lr: 0.1, momentum: 0.0, velocities: vec![] };
        assert!(opt.load_state(state).is_err());
    }
}
