//! Position-Wise Feed-Forward Network
//!
//! The second sublayer of every encoder layer: two linear projections
//! with a ReLU between them, applied independently at each position.
//!
//! ```text
//! FFN(x) = max(0, x @ W1 + b1) @ W2 + b2
//! ```
//!
//! ## Expansion
//!
//! The hidden dimension `d_ff` is wider than `d_model` (the original
//! Transformer uses 4×). Attention moves information *between*
//! positions; this expansion-then-compression is where each position
//! gets transformed on its own.

use super::activation::relu;
use super::linear::Linear;
use crate::tensor::Tensor;

/// Two-layer position-wise feed-forward network with ReLU.
#[derive(Debug)]
pub struct FeedForward {
    /// Expansion: [d_model, d_ff]
    pub fc1: Linear,
    /// Compression: [d_ff, d_model]
    pub fc2: Linear,
}

impl FeedForward {
    /// Create a feed-forward network mapping `d_model → d_ff → d_model`.
    pub fn new(d_model: usize, d_ff: usize) -> Self {
        Self {
            fc1: Linear::new(d_model, d_ff),
            fc2: Linear::new(d_ff, d_model),
        }
    }

    /// Number of learnable parameters across both projections.
    pub fn num_parameters(&self) -> usize {
        self.fc1.num_parameters() + self.fc2.num_parameters()
    }

    /// Forward pass: expand, rectify, compress.
    ///
    /// Input `[batch, seq, d_model]`, output the same shape.
    pub fn forward(&self, x: &Tensor) -> Tensor {
        let hidden = relu(&self.fc1.forward(x));
        self.fc2.forward(&hidden)
    }
}
