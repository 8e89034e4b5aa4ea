//! Activation Functions
//!
//! The position-wise feed-forward network uses ReLU, the rectification
//! from the original Transformer:
//!
//! ```text
//! ReLU(x) = max(0, x)
//! ```
//!
//! Zeroing the negative half makes the two linear projections around it
//! genuinely non-linear; without it they would collapse into a single
//! matrix multiply.

use crate::tensor::Tensor;

/// ReLU applied element-wise.
pub fn relu(x: &Tensor) -> Tensor {
    let result = x.data.iter().map(|&v| v.max(0.0)).collect();
    Tensor::new(result, x.shape.clone())
}
