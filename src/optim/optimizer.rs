//! Optimizer trait and serializable optimizer state

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::{Error, Result, Tensor};

/// Trait for optimization algorithms
pub trait Optimizer: std::fmt::Debug {
    /// Perform a single optimization step
    fn step(&mut self, params: &mut [Tensor]);

    /// Zero out all gradients
    fn zero_grad(&mut self, params: &mut [Tensor]) {
        for param in params {
            param.zero_grad();
        }
    }

    /// Get learning rate
    fn lr(&self) -> f32;

    /// Set learning rate
    fn set_lr(&mut self, lr: f32);

    /// Snapshot the optimizer internals for checkpointing
    fn state(&self) -> OptimState;

    /// Restore optimizer internals from a checkpoint snapshot
    fn load_state(&mut self, state: OptimState) -> Result<()>;
}

/// Serializable snapshot of an optimizer's internal state
///
/// Tagged by optimizer kind so that restoring an SGD snapshot into an Adam
/// instance fails loudly instead of silently corrupting moments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimState {
    Sgd {
        lr: f32,
        momentum: f32,
        velocities: Vec<Option<Vec<f32>>>,
    },
    Adam {
        lr: f32,
        beta1: f32,
        beta2: f32,
        epsilon: f32,
        t: u64,
        m: Vec<Option<Vec<f32>>>,
        v: Vec<Option<Vec<f32>>>,
    },
}

impl OptimState {
    /// Name of the optimizer kind this snapshot belongs to
    pub fn kind(&self) -> &'static str {
        match self {
            OptimState::Sgd { .. } => "sgd",
            OptimState::Adam { .. } => "adam",
        }
    }
}

/// Convert moment/velocity buffers to their serializable form
pub(crate) fn buffers_to_state(buffers: &[Option<Array1<f32>>]) -> Vec<Option<Vec<f32>>> {
    buffers.iter().map(|b| b.as_ref().map(|a| a.to_vec())).collect()
}

/// Convert serialized buffers back to ndarray form
pub(crate) fn buffers_from_state(state: Vec<Option<Vec<f32>>>) -> Vec<Option<Array1<f32>>> {
    state.into_iter().map(|b| b.map(Array1::from_vec)).collect()
}

/// Error for restoring a snapshot of the wrong kind
pub(crate) fn state_kind_mismatch(expected: &str, got: &OptimState) -> Error {
    Error::Consistency(format!(
        "cannot restore {} optimizer state into a {expected} optimizer",
        got.kind()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optim_state_kind() {
        let sgd = OptimState::Sgd { lr: 0.1, momentum: 0.0, velocities: vec![] };
        assert_eq!(sgd.kind(), "sgd");

        let adam = OptimState::Adam {
            lr: 0.001,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            t: 0,
            m: vec![],
            v: vec![],
        };
        assert_eq!(adam.kind(), "adam");
    }

    #[test]
    fn test_optim_state_json_round_trip() {
        let state = OptimState::Sgd {
            lr: 0.1,
            momentum: 0.9,
            velocities: vec![None, Some(vec![1.0, 2.0])],
        };
        let json = serde_json::to_string(&state).unwrap();
        let back: OptimState = serde_json::from_str(&json).unwrap();
        match back {
            OptimState::Sgd { lr, momentum, velocities } => {
                assert_eq!(lr, 0.1);
                assert_eq!(momentum, 0.9);
                assert_eq!(velocities[1], Some(vec![1.0, 2.0]));
            }
            OptimState::Adam { .. } => panic!("wrong kind after round trip"),
        }
    }

    #[test]
    fn test_buffer_conversion_round_trip() {
        let buffers = vec![None, Some(Array1::from_vec(vec![0.5, 0.25]))];
        let state = buffers_to_state(&buffers);
        let back = buffers_from_state(state);
        assert!(back[0].is_none());
        assert_eq!(back[1].as_ref().unwrap().to_vec(), vec![0.5, 0.25]);
    }
}
