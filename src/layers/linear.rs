//! Linear Layer (Fully Connected)
//!
//! The linear layer is the workhorse of the encoder: the query, key,
//! value, and output projections of attention, both halves of the
//! feed-forward network, and the final classifier head are all instances
//! of the same affine transformation `y = x @ W + b`.
//!
//! ## Shape Transformation
//!
//! ```text
//! Input:  [batch, seq, in_features]  (or [rows, in_features])
//! Weight: W [in_features, out_features]
//! Bias:   b [out_features]
//! Output: [batch, seq, out_features]
//! ```
//!
//! The projection acts on the last axis only, independently at every
//! position. A 3D input is flattened to 2D for the matmul and restored
//! afterwards.

use crate::tensor::Tensor;
use rand_distr::{Distribution, Normal};

/// Affine projection `y = x @ W + b`.
#[derive(Debug)]
pub struct Linear {
    /// Weight matrix: [in_features, out_features]
    pub weight: Tensor,
    /// Bias vector: [out_features]
    pub bias: Tensor,
}

impl Linear {
    /// Create a new linear layer with random initialization.
    ///
    /// Weights are drawn from N(0, 0.02), the initialization GPT-2 uses;
    /// small initial weights keep early activations in the range where
    /// softmax and layer norm behave well. Bias starts at zero.
    pub fn new(in_features: usize, out_features: usize) -> Self {
        let mut rng = rand::rng();
        let normal = Normal::new(0.0, 0.02).unwrap();

        let weight_data: Vec<f32> = (0..in_features * out_features)
            .map(|_| normal.sample(&mut rng))
            .collect();

        Self {
            weight: Tensor::new(weight_data, vec![in_features, out_features]),
            bias: Tensor::zeros(vec![out_features]),
        }
    }

    /// Build a layer from explicit parameters (useful in tests and for
    /// externally supplied weights).
    ///
    /// # Panics
    ///
    /// Panics if `weight` is not rank 2 or `bias` does not match its
    /// output dimension.
    pub fn from_parameters(weight: Tensor, bias: Tensor) -> Self {
        assert_eq!(weight.ndim(), 2, "Linear weight must be a matrix");
        assert_eq!(
            bias.data.len(),
            weight.shape[1],
            "Bias length {} does not match output dimension {}",
            bias.data.len(),
            weight.shape[1]
        );
        Self { weight, bias }
    }

    /// Input dimension of the projection.
    pub fn in_features(&self) -> usize {
        self.weight.shape[0]
    }

    /// Output dimension of the projection.
    pub fn out_features(&self) -> usize {
        self.weight.shape[1]
    }

    /// Number of learnable parameters (weight + bias).
    pub fn num_parameters(&self) -> usize {
        self.weight.data.len() + self.bias.data.len()
    }

    /// Forward pass: `y = x @ W + b` on the last axis.
    ///
    /// Accepts a 2D `[rows, in_features]` or 3D `[batch, seq, in_features]`
    /// input; the output keeps the leading dimensions and swaps the last
    /// one for `out_features`.
    ///
    /// # Panics
    ///
    /// Panics if the last dimension of `x` is not `in_features`.
    pub fn forward(&self, x: &Tensor) -> Tensor {
        assert_eq!(
            *x.shape.last().expect("Linear input must have a last axis"),
            self.in_features(),
            "Linear expects last dimension {}, got shape {:?}",
            self.in_features(),
            x.shape
        );

        if x.ndim() == 2 {
            return x.matmul(&self.weight).add(&self.bias);
        }

        // Flatten leading dims, project, restore.
        let rows: usize = x.shape[..x.ndim() - 1].iter().product();
        let x_2d = x.reshape(&[rows, self.in_features()]);
        let y_2d = x_2d.matmul(&self.weight);

        let mut out_shape = x.shape.clone();
        *out_shape.last_mut().unwrap() = self.out_features();
        y_2d.reshape(&out_shape).add(&self.bias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_identity_weight() {
        let weight = Tensor::new(vec![1.0, 0.0, 0.0, 1.0], vec![2, 2]);
        let bias = Tensor::new(vec![0.5, -0.5], vec![2]);
        let layer = Linear::from_parameters(weight, bias);

        let x = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]);
        let y = layer.forward(&x);
        assert_eq!(y.data, vec![1.5, 1.5, 3.5, 3.5]);
    }

    #[test]
    fn test_forward_3d_keeps_leading_dims() {
        let layer = Linear::new(4, 6);
        let x = Tensor::zeros(vec![2, 3, 4]);
        let y = layer.forward(&x);
        assert_eq!(y.shape, vec![2, 3, 6]);
    }

    #[test]
    fn test_num_parameters() {
        let layer = Linear::new(4, 6);
        assert_eq!(layer.num_parameters(), 4 * 6 + 6);
    }

    #[test]
    #[should_panic(expected = "Linear expects last dimension")]
    fn test_forward_wrong_last_dim_panics() {
        let layer = Linear::new(4, 6);
        let x = Tensor::zeros(vec![2, 3, 5]);
        layer.forward(&x);
    }
}
