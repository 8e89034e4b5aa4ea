//! Dropout Layer
//!
//! Dropout randomly zeros activations during training so the network
//! cannot lean on any single unit. Kept values are scaled by
//! `1 / (1 - rate)` (inverted dropout), which keeps the expected
//! activation unchanged, so evaluation needs no rescaling at all: in
//! eval mode the layer is the identity.

use crate::tensor::Tensor;

/// Dropout with a train/eval mode switch.
///
/// In the encoder this regularizes the attention weights and both
/// residual branches. Construct it, then flip [`Dropout::set_training`]
/// to `false` for inference.
#[derive(Debug)]
pub struct Dropout {
    /// Probability of zeroing each element
    pub rate: f32,
    /// Whether the layer is in training mode
    pub training: bool,
}

impl Dropout {
    /// Create a new dropout layer.
    ///
    /// # Panics
    ///
    /// Panics if `rate` is not in `[0.0, 1.0)`. A rate of 1.0 would zero
    /// everything and divide by zero when rescaling.
    pub fn new(rate: f32) -> Self {
        assert!(
            (0.0..1.0).contains(&rate),
            "Dropout rate must be in [0.0, 1.0), got {}",
            rate
        );
        Self {
            rate,
            training: true,
        }
    }

    /// Switch between training (stochastic) and evaluation (identity) mode.
    pub fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    /// Forward pass.
    ///
    /// Training mode: each element survives with probability `1 - rate`
    /// and is scaled by `1 / (1 - rate)`. Eval mode or `rate == 0`: the
    /// input passes through untouched.
    pub fn forward(&self, x: &Tensor) -> Tensor {
        if !self.training || self.rate == 0.0 {
            return x.clone();
        }

        let scale = 1.0 / (1.0 - self.rate);
        let result = x
            .data
            .iter()
            .map(|&v| {
                if rand::random::<f32>() < self.rate {
                    0.0
                } else {
                    v * scale
                }
            })
            .collect();

        Tensor::new(result, x.shape.clone())
    }
}
