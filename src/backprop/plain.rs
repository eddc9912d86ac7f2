//! Unweighted loss summation policy

use super::WeightPolicy;

/// Sum every task loss unweighted into the frontend gradient
pub struct Plain;

impl WeightPolicy for Plain {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn weights(&mut self, losses: &[f32]) -> Vec<f32> {
        vec![1.0; losses.len()]
    }
}
