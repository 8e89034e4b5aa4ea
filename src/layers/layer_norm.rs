//! Layer Normalization
//!
//! Normalizes activations across the feature axis to zero mean and unit
//! variance, then applies a learnable scale (gamma) and shift (beta).
//! In the post-norm encoder wiring, this runs on the *sum* of each
//! residual connection, keeping the magnitude of the residual stream
//! stable as layers stack.
//!
//! ## Formula
//!
//! ```text
//! 1. mean = E[x]                        (over the feature axis)
//! 2. var  = E[(x - mean)²]
//! 3. y    = γ * (x - mean) / √(var + ε) + β
//! ```
//!
//! Unlike batch normalization, the statistics are computed per position,
//! so the result is independent of batch size and sequence length.

use crate::tensor::Tensor;

/// Layer normalization over the last (feature) axis.
#[derive(Debug)]
pub struct LayerNorm {
    /// Scale parameter (learnable): [d_model]
    pub gamma: Tensor,
    /// Shift parameter (learnable): [d_model]
    pub beta: Tensor,
    /// Small constant for numerical stability
    pub eps: f32,
}

impl LayerNorm {
    /// Create a layer norm over a feature dimension of size `d_model`.
    ///
    /// Gamma starts at 1 and beta at 0, so the layer is initially a pure
    /// normalization. Epsilon is the conventional 1e-5.
    pub fn new(d_model: usize) -> Self {
        Self {
            gamma: Tensor::ones(vec![d_model]),
            beta: Tensor::zeros(vec![d_model]),
            eps: 1e-5,
        }
    }

    /// Number of learnable parameters (gamma + beta).
    pub fn num_parameters(&self) -> usize {
        self.gamma.data.len() + self.beta.data.len()
    }

    /// Forward pass: normalize along the last axis, then scale and shift.
    ///
    /// Input is typically `[batch, seq, d_model]`; the output has the
    /// same shape.
    ///
    /// # Panics
    ///
    /// Panics if the last dimension of `x` does not match the parameter
    /// size.
    pub fn forward(&self, x: &Tensor) -> Tensor {
        assert_eq!(
            x.shape.last(),
            Some(&self.gamma.data.len()),
            "LayerNorm over {} features got shape {:?}",
            self.gamma.data.len(),
            x.shape
        );

        let mean = x.mean_last(true);
        let std = x.var_last(true).add_scalar(self.eps).sqrt();
        let normalized = x.sub(&mean).div(&std);

        normalized.mul(&self.gamma).add(&self.beta)
    }
}
