//! Encoder Layer and Encoder Stack
//!
//! One encoder layer is two sublayers, each wrapped in a residual
//! connection and layer normalization:
//!
//! ```text
//! h = LayerNorm(x + Dropout(SelfAttention(x)))
//! y = LayerNorm(h + Dropout(FeedForward(h)))
//! ```
//!
//! ## Post-Norm
//!
//! Normalization runs on the *sum* of input and sublayer output (the
//! wiring of the original Transformer), so the output of every layer is
//! freshly normalized and the encoder preserves shape exactly:
//! `[batch, seq, d_model]` in, `[batch, seq, d_model]` out.
//!
//! ## Residual Connections
//!
//! Adding the sublayer's input back to its output gives gradients a
//! direct path through the stack and lets each sublayer learn a
//! refinement of the representation rather than a replacement.
//!
//! The encoder stack is simply N independently parameterized layers
//! applied in sequence, each receiving the same mask.

use super::attention::MultiHeadAttention;
use super::dropout::Dropout;
use super::feed_forward::FeedForward;
use super::layer_norm::LayerNorm;
use crate::error::Result;
use crate::tensor::Tensor;

/// A single transformer encoder layer (self-attention + feed-forward,
/// post-norm residual wiring).
#[derive(Debug)]
pub struct EncoderLayer {
    /// Bidirectional self-attention
    pub self_attn: MultiHeadAttention,
    /// Normalization after the attention residual
    pub norm1: LayerNorm,
    /// Position-wise feed-forward network
    pub feed_forward: FeedForward,
    /// Normalization after the feed-forward residual
    pub norm2: LayerNorm,
    /// Dropout on the attention branch
    pub dropout1: Dropout,
    /// Dropout on the feed-forward branch
    pub dropout2: Dropout,
}

impl EncoderLayer {
    /// Create an encoder layer.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidHeads`](crate::ModelError::InvalidHeads)
    /// if `d_model` is not divisible by `n_heads`.
    pub fn new(d_model: usize, n_heads: usize, d_ff: usize, dropout_rate: f32) -> Result<Self> {
        Ok(Self {
            self_attn: MultiHeadAttention::new(d_model, n_heads, dropout_rate)?,
            norm1: LayerNorm::new(d_model),
            feed_forward: FeedForward::new(d_model, d_ff),
            norm2: LayerNorm::new(d_model),
            dropout1: Dropout::new(dropout_rate),
            dropout2: Dropout::new(dropout_rate),
        })
    }

    /// Switch between training and evaluation mode.
    pub fn set_training(&mut self, training: bool) {
        self.self_attn.set_training(training);
        self.dropout1.set_training(training);
        self.dropout2.set_training(training);
    }

    /// Number of learnable parameters in the layer.
    pub fn num_parameters(&self) -> usize {
        self.self_attn.num_parameters()
            + self.norm1.num_parameters()
            + self.feed_forward.num_parameters()
            + self.norm2.num_parameters()
    }

    /// Forward pass.
    ///
    /// `x` is `[batch, seq, d_model]`; the optional mask broadcasts to
    /// `[batch, heads, seq, seq]`. The output has exactly the shape of
    /// the input.
    ///
    /// # Errors
    ///
    /// Propagates shape rejections from the attention sublayer.
    pub fn forward(&self, x: &Tensor, mask: Option<&Tensor>) -> Result<Tensor> {
        // Sublayer 1: self-attention, residual, normalize.
        let (attn_out, _weights) = self.self_attn.forward(x, x, x, mask)?;
        let h = self.norm1.forward(&x.add(&self.dropout1.forward(&attn_out)));

        // Sublayer 2: feed-forward, residual, normalize.
        let ff_out = self.feed_forward.forward(&h);
        let y = self.norm2.forward(&h.add(&self.dropout2.forward(&ff_out)));

        Ok(y)
    }
}

/// A stack of independently parameterized encoder layers.
#[derive(Debug)]
pub struct Encoder {
    /// The layers, applied in order
    pub layers: Vec<EncoderLayer>,
}

impl Encoder {
    /// Create an encoder with `n_layers` layers.
    ///
    /// # Errors
    ///
    /// Returns the first configuration rejection from layer
    /// construction (divisibility of `d_model` by `n_heads`).
    pub fn new(
        n_layers: usize,
        d_model: usize,
        n_heads: usize,
        d_ff: usize,
        dropout_rate: f32,
    ) -> Result<Self> {
        let layers = (0..n_layers)
            .map(|_| EncoderLayer::new(d_model, n_heads, d_ff, dropout_rate))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { layers })
    }

    /// Number of layers in the stack.
    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    /// Switch every layer between training and evaluation mode.
    pub fn set_training(&mut self, training: bool) {
        for layer in &mut self.layers {
            layer.set_training(training);
        }
    }

    /// Total learnable parameters across the stack.
    pub fn num_parameters(&self) -> usize {
        self.layers.iter().map(EncoderLayer::num_parameters).sum()
    }

    /// Forward pass: each layer consumes the previous layer's output;
    /// every layer sees the same mask. The output of the last layer is
    /// the result.
    ///
    /// # Errors
    ///
    /// Propagates shape rejections from the first offending layer.
    pub fn forward(&self, x: &Tensor, mask: Option<&Tensor>) -> Result<Tensor> {
        let mut hidden = x.clone();
        for layer in &self.layers {
            hidden = layer.forward(&hidden, mask)?;
        }
        Ok(hidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::attention::padding_mask;

    #[test]
    fn test_layer_preserves_shape_exactly() {
        let layer = EncoderLayer::new(8, 2, 32, 0.0).unwrap();
        let x = Tensor::ones(vec![3, 7, 8]);
        let y = layer.forward(&x, None).unwrap();
        assert_eq!(y.shape, x.shape);
    }

    #[test]
    fn test_layer_rejects_indivisible_heads() {
        assert!(EncoderLayer::new(10, 3, 40, 0.0).is_err());
    }

    #[test]
    fn test_layer_accepts_padding_mask() {
        let layer = EncoderLayer::new(4, 2, 16, 0.0).unwrap();
        let x = Tensor::ones(vec![2, 5, 4]);
        let mask = padding_mask(&[5, 3], 5);
        let y = layer.forward(&x, Some(&mask)).unwrap();
        assert_eq!(y.shape, vec![2, 5, 4]);
    }

    #[test]
    fn test_stack_depth_and_shape() {
        let encoder = Encoder::new(3, 8, 2, 32, 0.0).unwrap();
        assert_eq!(encoder.depth(), 3);

        let x = Tensor::ones(vec![1, 4, 8]);
        let y = encoder.forward(&x, None).unwrap();
        assert_eq!(y.shape, vec![1, 4, 8]);
    }

    #[test]
    fn test_stack_layers_are_independently_parameterized() {
        let encoder = Encoder::new(2, 8, 2, 32, 0.0).unwrap();
        // Random init: the two layers' query weights should differ.
        let w0 = &encoder.layers[0].self_attn.w_q.weight.data;
        let w1 = &encoder.layers[1].self_attn.w_q.weight.data;
        assert_ne!(w0, w1);
    }

    #[test]
    fn test_layer_output_is_normalized() {
        // Post-norm: the final operation is a LayerNorm, so every
        // position of the output has mean ~0 and variance ~1.
        let layer = EncoderLayer::new(16, 4, 64, 0.0).unwrap();
        let x = Tensor::new((0..64).map(|i| (i as f32).cos()).collect(), vec![1, 4, 16]);
        let y = layer.forward(&x, None).unwrap();

        for row in y.data.chunks(16) {
            let mean: f32 = row.iter().sum::<f32>() / 16.0;
            let var: f32 = row.iter().map(|&v| (v - mean) * (v - mean)).sum::<f32>() / 16.0;
            assert!(mean.abs() < 1e-4, "row mean {} not near zero", mean);
            assert!((var - 1.0).abs() < 1e-2, "row variance {} not near one", var);
        }
    }

    #[test]
    fn test_parameter_count_matches_hand_count() {
        let layer = EncoderLayer::new(4, 2, 8, 0.0).unwrap();
        // Attention: 4 projections of (4*4 + 4); norms: 2 * (4 + 4);
        // feed-forward: (4*8 + 8) + (8*4 + 4).
        let expected = 4 * (16 + 4) + 2 * 8 + (32 + 8) + (32 + 4);
        assert_eq!(layer.num_parameters(), expected);
    }
}
