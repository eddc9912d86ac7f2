//! Parameter tensor with gradient buffer
//!
//! A flat `f32` parameter buffer plus an optional gradient of the same
//! length. Gradients are written by the model collaborators during their
//! backward passes and consumed by the optimizers.

use ndarray::Array1;

/// A 1-D parameter tensor with an optional gradient
#[derive(Debug, Clone)]
pub struct Tensor {
    data: Array1<f32>,
    grad: Option<Array1<f32>>,
    requires_grad: bool,
}

impl Tensor {
    /// Create a tensor from a vector of values
    pub fn from_vec(data: Vec<f32>, requires_grad: bool) -> Self {
        Self { data: Array1::from_vec(data), grad: None, requires_grad }
    }

    /// Create a zero-initialized tensor
    pub fn zeros(len: usize, requires_grad: bool) -> Self {
        Self { data: Array1::zeros(len), grad: None, requires_grad }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the tensor holds no elements
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Immutable view of the values
    pub fn data(&self) -> &Array1<f32> {
        &self.data
    }

    /// Mutable view of the values
    pub fn data_mut(&mut self) -> &mut Array1<f32> {
        &mut self.data
    }

    /// Whether gradients are tracked for this tensor
    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    /// Current gradient, if one has been accumulated
    pub fn grad(&self) -> Option<&Array1<f32>> {
        self.grad.as_ref()
    }

    /// Replace the gradient buffer
    pub fn set_grad(&mut self, grad: Array1<f32>) {
        self.grad = Some(grad);
    }

    /// Add `grad` into the gradient buffer, allocating zeros on first use
    pub fn accumulate_grad(&mut self, grad: &Array1<f32>) {
        match &mut self.grad {
            Some(g) => *g += grad,
            None => self.grad = Some(grad.clone()),
        }
    }

    /// Clear the gradient buffer
    pub fn zero_grad(&mut self) {
        self.grad = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn test_from_vec() {
        let t = Tensor::from_vec(vec![1.0, 2.0, 3.0], true);
        assert_eq!(t.len(), 3);
        assert!(t.requires_grad());
        assert!(t.grad().is_none());
    }

    #[test]
    fn test_zeros() {
        let t = Tensor::zeros(4, false);
        assert_eq!(t.len(), 4);
        assert!(!t.requires_grad());
        assert!(t.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_accumulate_grad() {
        let mut t = Tensor::zeros(2, true);
        t.accumulate_grad(&arr1(&[1.0, 2.0]));
        t.accumulate_grad(&arr1(&[0.5, 0.5]));

        let grad = t.grad().unwrap();
        assert_eq!(grad[0], 1.5);
        assert_eq!(grad[1], 2.5);
    }

    #[test]
    fn test_zero_grad() {
        let mut t = Tensor::zeros(2, true);
        t.set_grad(arr1(&[1.0, 1.0]));
        assert!(t.grad().is_some());

        t.zero_grad();
        assert!(t.grad().is_none());
    }

    #[test]
    fn test_data_mut() {
        let mut t = Tensor::from_vec(vec![1.0, 2.0], true);
        t.data_mut()[0] = 5.0;
        assert_eq!(t.data()[0], 5.0);
    }
}
