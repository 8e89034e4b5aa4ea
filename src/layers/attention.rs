//! Attention Mechanisms
//!
//! Attention is the core idea of the transformer: every position builds
//! its output as a weighted average of the values, with weights derived
//! from how well its query matches each key.
//!
//! ## Scaled Dot-Product Attention
//!
//! ```text
//! scores  = (Q @ Kᵀ) / √d_k
//! weights = softmax(masked_scores)       (rows sum to 1)
//! output  = weights @ V
//! ```
//!
//! ## Why Scaling?
//!
//! For random vectors of dimension d_k, the dot products grow like √d_k.
//! Dividing by √d_k keeps the scores in the range where softmax still
//! has usable gradients instead of saturating to a one-hot row.
//!
//! ## Masking
//!
//! An encoder attends bidirectionally, but padded key positions must not
//! contribute. Masked scores are pinned to `-inf` *before* softmax, which
//! is the only way to guarantee exactly zero weight after normalization;
//! zeroing the weights afterwards would break the rows-sum-to-1 property.
//!
//! ## Multi-Head Attention
//!
//! Instead of one attention over the full `d_model`, the projected
//! queries, keys, and values are split into `n_heads` slices of
//! `d_model / n_heads` features each, attention runs on every slice
//! independently (vectorized over the head axis, one batched matmul),
//! and the outputs are concatenated and re-projected. Each head can
//! learn its own notion of relevance.

use super::dropout::Dropout;
use super::linear::Linear;
use crate::error::{ModelError, Result};
use crate::tensor::Tensor;

/// Scaled dot-product attention over explicit head-split arrays.
///
/// # Arguments
///
/// * `query` - `[batch, heads, q_len, d_k]`
/// * `key` - `[batch, heads, k_len, d_k]`
/// * `value` - `[batch, heads, k_len, d_v]`
/// * `mask` - optional, broadcastable to `[batch, heads, q_len, k_len]`;
///   non-zero entries mark positions that must receive zero weight.
///   Every query row needs at least one unmasked key.
/// * `dropout` - optional dropout applied to the normalized weights
///   (active only in training mode)
///
/// # Returns
///
/// `(output, weights)` where `output` is `[batch, heads, q_len, d_v]`
/// and `weights` is `[batch, heads, q_len, k_len]`. The returned weights
/// are the normalized, **pre-dropout** distribution; dropout only
/// perturbs the copy used to compute the output.
///
/// # Errors
///
/// Rejects, before any computation, inputs whose ranks are not 4, whose
/// query/key feature dimensions differ, or whose key/value lengths or
/// batch/head dimensions disagree.
pub fn scaled_dot_product_attention(
    query: &Tensor,
    key: &Tensor,
    value: &Tensor,
    mask: Option<&Tensor>,
    dropout: Option<&Dropout>,
) -> Result<(Tensor, Tensor)> {
    for (name, t) in [("query", query), ("key", key), ("value", value)] {
        if t.ndim() != 4 {
            return Err(ModelError::InvalidRank {
                op: name,
                expected: 4,
                got: t.shape.clone(),
            });
        }
    }

    // Q and K must share batch, heads, and the feature dimension d_k.
    if query.shape[..2] != key.shape[..2] || query.shape[3] != key.shape[3] {
        return Err(ModelError::ShapeMismatch {
            op: "attention query/key",
            expected: query.shape.clone(),
            got: key.shape.clone(),
        });
    }

    // K and V must share batch, heads, and the sequence length k_len.
    if key.shape[..3] != value.shape[..3] {
        return Err(ModelError::ShapeMismatch {
            op: "attention key/value",
            expected: key.shape.clone(),
            got: value.shape.clone(),
        });
    }

    let d_k = query.shape[3];
    let scale = 1.0 / (d_k as f32).sqrt();

    // Raw similarity: Q @ Kᵀ, scaled by 1/√d_k.
    let mut scores = query.matmul(&key.transpose(-2, -1)).mul_scalar(scale);

    if let Some(mask) = mask {
        scores = scores.masked_fill(mask, f32::NEG_INFINITY);
    }

    let weights = scores.softmax_last();

    let applied = match dropout {
        Some(dropout) => dropout.forward(&weights),
        None => weights.clone(),
    };
    let output = applied.matmul(value);

    Ok((output, weights))
}

/// Build a padding mask from per-sequence valid lengths.
///
/// Returns a `[batch, 1, 1, k_len]` tensor with 1.0 at every key
/// position at or beyond the sequence's valid length, ready to broadcast
/// across heads and query positions in
/// [`scaled_dot_product_attention`].
///
/// # Panics
///
/// Panics if any length exceeds `k_len`.
pub fn padding_mask(lengths: &[usize], k_len: usize) -> Tensor {
    let batch = lengths.len();
    let mut data = vec![0.0; batch * k_len];

    for (b, &len) in lengths.iter().enumerate() {
        assert!(
            len <= k_len,
            "Valid length {} exceeds key length {}",
            len,
            k_len
        );
        for j in len..k_len {
            data[b * k_len + j] = 1.0;
        }
    }

    Tensor::new(data, vec![batch, 1, 1, k_len])
}

/// Multi-head attention with learned projections.
///
/// Four `d_model × d_model` projections: queries, keys, and values each
/// get their own, and a fourth re-mixes the concatenated head outputs.
/// Self-attention passes the same array as query, key, and value; the
/// three inputs may also differ (the shape contract only ties key and
/// value lengths together).
#[derive(Debug)]
pub struct MultiHeadAttention {
    /// Query projection
    pub w_q: Linear,
    /// Key projection
    pub w_k: Linear,
    /// Value projection
    pub w_v: Linear,
    /// Output projection over the concatenated heads
    pub w_o: Linear,
    /// Dropout on the attention weights
    pub attn_dropout: Dropout,
    /// Number of attention heads
    pub n_heads: usize,
    /// Feature dimension per head (d_model / n_heads)
    pub head_dim: usize,
    /// Model dimension
    pub d_model: usize,
}

impl MultiHeadAttention {
    /// Create a new multi-head attention layer.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidHeads`] if `d_model` is not evenly
    /// divisible by `n_heads` (or `n_heads` is zero), before allocating
    /// any parameters.
    pub fn new(d_model: usize, n_heads: usize, dropout_rate: f32) -> Result<Self> {
        if n_heads == 0 || d_model % n_heads != 0 {
            return Err(ModelError::InvalidHeads { d_model, n_heads });
        }

        Ok(Self {
            w_q: Linear::new(d_model, d_model),
            w_k: Linear::new(d_model, d_model),
            w_v: Linear::new(d_model, d_model),
            w_o: Linear::new(d_model, d_model),
            attn_dropout: Dropout::new(dropout_rate),
            n_heads,
            head_dim: d_model / n_heads,
            d_model,
        })
    }

    /// Switch between training and evaluation mode (affects dropout only).
    pub fn set_training(&mut self, training: bool) {
        self.attn_dropout.set_training(training);
    }

    /// Number of learnable parameters across all four projections.
    pub fn num_parameters(&self) -> usize {
        self.w_q.num_parameters()
            + self.w_k.num_parameters()
            + self.w_v.num_parameters()
            + self.w_o.num_parameters()
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// * `query` - `[batch, q_len, d_model]`
    /// * `key` - `[batch, k_len, d_model]`
    /// * `value` - `[batch, k_len, d_model]`
    /// * `mask` - optional, broadcastable to `[batch, heads, q_len, k_len]`
    ///
    /// # Returns
    ///
    /// `(output, weights)`: the attended output `[batch, q_len, d_model]`
    /// and the per-head attention weights `[batch, heads, q_len, k_len]`.
    ///
    /// # Errors
    ///
    /// Rejects non-rank-3 inputs, a last dimension that is not
    /// `d_model`, and batch or key/value length mismatches.
    pub fn forward(
        &self,
        query: &Tensor,
        key: &Tensor,
        value: &Tensor,
        mask: Option<&Tensor>,
    ) -> Result<(Tensor, Tensor)> {
        for (name, t) in [("query", query), ("key", key), ("value", value)] {
            if t.ndim() != 3 {
                return Err(ModelError::InvalidRank {
                    op: name,
                    expected: 3,
                    got: t.shape.clone(),
                });
            }
            if t.shape[2] != self.d_model {
                return Err(ModelError::ShapeMismatch {
                    op: "multi-head attention input",
                    expected: vec![t.shape[0], t.shape[1], self.d_model],
                    got: t.shape.clone(),
                });
            }
        }
        if query.shape[0] != key.shape[0] || key.shape[..2] != value.shape[..2] {
            return Err(ModelError::ShapeMismatch {
                op: "multi-head attention batch/length",
                expected: key.shape.clone(),
                got: value.shape.clone(),
            });
        }

        // 1. Independent learned projections.
        let q = self.w_q.forward(query);
        let k = self.w_k.forward(key);
        let v = self.w_v.forward(value);

        // 2. Split d_model into heads: [batch, seq, d_model] ->
        //    [batch, heads, seq, head_dim].
        let q = self.split_heads(&q);
        let k = self.split_heads(&k);
        let v = self.split_heads(&v);

        // 3. Attention for all heads at once (one batched matmul).
        let (attended, weights) =
            scaled_dot_product_attention(&q, &k, &v, mask, Some(&self.attn_dropout))?;

        // 4. Concatenate heads and 5. re-project.
        let merged = self.merge_heads(&attended);
        let output = self.w_o.forward(&merged);

        Ok((output, weights))
    }

    /// `[batch, seq, d_model] -> [batch, heads, seq, head_dim]`
    ///
    /// The feature axis is sliced into contiguous per-head chunks and the
    /// head axis is moved ahead of the sequence axis so that each head is
    /// a contiguous block for the batched matmul.
    fn split_heads(&self, x: &Tensor) -> Tensor {
        let (batch, seq) = (x.shape[0], x.shape[1]);
        x.reshape(&[batch, seq, self.n_heads, self.head_dim])
            .transpose(1, 2)
    }

    /// `[batch, heads, seq, head_dim] -> [batch, seq, d_model]`
    ///
    /// Inverse of [`Self::split_heads`].
    fn merge_heads(&self, x: &Tensor) -> Tensor {
        let (batch, seq) = (x.shape[0], x.shape[2]);
        x.transpose(1, 2).reshape(&[batch, seq, self.d_model])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sdpa_output_shape() {
        let q = Tensor::ones(vec![2, 3, 5, 4]);
        let k = Tensor::ones(vec![2, 3, 7, 4]);
        let v = Tensor::ones(vec![2, 3, 7, 6]);
        let (out, weights) = scaled_dot_product_attention(&q, &k, &v, None, None).unwrap();
        assert_eq!(out.shape, vec![2, 3, 5, 6]);
        assert_eq!(weights.shape, vec![2, 3, 5, 7]);
    }

    #[test]
    fn test_sdpa_weight_rows_sum_to_one() {
        let q = Tensor::new((0..24).map(|i| i as f32 * 0.1).collect(), vec![1, 2, 3, 4]);
        let k = Tensor::new((0..40).map(|i| i as f32 * 0.05).collect(), vec![1, 2, 5, 4]);
        let v = Tensor::ones(vec![1, 2, 5, 4]);
        let (_, weights) = scaled_dot_product_attention(&q, &k, &v, None, None).unwrap();
        for row in weights.data.chunks(5) {
            assert_relative_eq!(row.iter().sum::<f32>(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_sdpa_identical_keys_give_uniform_weights() {
        // All keys identical: every key is equally similar to any query.
        let q = Tensor::ones(vec![1, 1, 2, 4]);
        let k = Tensor::ones(vec![1, 1, 5, 4]);
        let v = Tensor::ones(vec![1, 1, 5, 4]);
        let (_, weights) = scaled_dot_product_attention(&q, &k, &v, None, None).unwrap();
        for &w in &weights.data {
            assert_relative_eq!(w, 0.2, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_sdpa_masked_position_gets_exactly_zero_weight() {
        let q = Tensor::ones(vec![1, 1, 2, 4]);
        let k = Tensor::ones(vec![1, 1, 3, 4]);
        let v = Tensor::ones(vec![1, 1, 3, 4]);

        // Mask out the last key for every query.
        let mask = Tensor::new(vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0], vec![2, 3]);
        let (_, weights) = scaled_dot_product_attention(&q, &k, &v, Some(&mask), None).unwrap();

        for row in weights.data.chunks(3) {
            assert_eq!(row[2], 0.0);
            assert_relative_eq!(row[0] + row[1], 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_sdpa_rejects_feature_mismatch() {
        let q = Tensor::ones(vec![1, 1, 2, 4]);
        let k = Tensor::ones(vec![1, 1, 2, 5]);
        let v = Tensor::ones(vec![1, 1, 2, 5]);
        let err = scaled_dot_product_attention(&q, &k, &v, None, None).unwrap_err();
        assert!(matches!(err, ModelError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_sdpa_rejects_key_value_length_mismatch() {
        let q = Tensor::ones(vec![1, 1, 2, 4]);
        let k = Tensor::ones(vec![1, 1, 3, 4]);
        let v = Tensor::ones(vec![1, 1, 5, 4]);
        let err = scaled_dot_product_attention(&q, &k, &v, None, None).unwrap_err();
        assert!(matches!(err, ModelError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_sdpa_rejects_wrong_rank() {
        let q = Tensor::ones(vec![2, 4]);
        let err = scaled_dot_product_attention(&q, &q, &q, None, None).unwrap_err();
        assert!(matches!(err, ModelError::InvalidRank { .. }));
    }

    #[test]
    fn test_mha_rejects_indivisible_heads() {
        let err = MultiHeadAttention::new(10, 3, 0.0).unwrap_err();
        assert_eq!(
            err,
            ModelError::InvalidHeads {
                d_model: 10,
                n_heads: 3
            }
        );
    }

    #[test]
    fn test_mha_rejects_zero_heads() {
        assert!(MultiHeadAttention::new(8, 0, 0.0).is_err());
    }

    #[test]
    fn test_mha_forward_shapes() {
        let mha = MultiHeadAttention::new(8, 2, 0.0).unwrap();
        let x = Tensor::ones(vec![2, 5, 8]);
        let (out, weights) = mha.forward(&x, &x, &x, None).unwrap();
        assert_eq!(out.shape, vec![2, 5, 8]);
        assert_eq!(weights.shape, vec![2, 2, 5, 5]);
    }

    #[test]
    fn test_mha_rejects_wrong_model_dim() {
        let mha = MultiHeadAttention::new(8, 2, 0.0).unwrap();
        let x = Tensor::ones(vec![2, 5, 6]);
        assert!(mha.forward(&x, &x, &x, None).is_err());
    }

    #[test]
    fn test_mha_rejects_key_value_length_mismatch() {
        let mha = MultiHeadAttention::new(8, 2, 0.0).unwrap();
        let q = Tensor::ones(vec![1, 5, 8]);
        let k = Tensor::ones(vec![1, 4, 8]);
        let v = Tensor::ones(vec![1, 3, 8]);
        assert!(mha.forward(&q, &k, &v, None).is_err());
    }

    #[test]
    fn test_single_head_mha_equals_sdpa_with_projections() {
        let mha = MultiHeadAttention::new(6, 1, 0.0).unwrap();
        let x = Tensor::new((0..36).map(|i| (i as f32).sin()).collect(), vec![2, 3, 6]);

        let (mha_out, _) = mha.forward(&x, &x, &x, None).unwrap();

        // Same computation spelled out: project, attend as one head,
        // re-project. With one head, the head split is just a reshape.
        let q = mha.w_q.forward(&x).reshape(&[2, 1, 3, 6]);
        let k = mha.w_k.forward(&x).reshape(&[2, 1, 3, 6]);
        let v = mha.w_v.forward(&x).reshape(&[2, 1, 3, 6]);
        let (attended, _) = scaled_dot_product_attention(&q, &k, &v, None, None).unwrap();
        let manual_out = mha.w_o.forward(&attended.reshape(&[2, 3, 6]));

        for (a, b) in mha_out.data.iter().zip(&manual_out.data) {
            assert_relative_eq!(a, b, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_split_merge_heads_roundtrip() {
        let mha = MultiHeadAttention::new(8, 4, 0.0).unwrap();
        let x = Tensor::new((0..48).map(|i| i as f32).collect(), vec![2, 3, 8]);
        let roundtrip = mha.merge_heads(&mha.split_heads(&x));
        assert_eq!(roundtrip.shape, x.shape);
        assert_eq!(roundtrip.data, x.data);
    }

    #[test]
    fn test_padding_mask_layout() {
        let mask = padding_mask(&[3, 1], 4);
        assert_eq!(mask.shape, vec![2, 1, 1, 4]);
        assert_eq!(mask.data, vec![0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_mha_with_padding_mask_zeroes_padded_keys() {
        let mha = MultiHeadAttention::new(4, 2, 0.0).unwrap();
        let x = Tensor::ones(vec![2, 3, 4]);
        let mask = padding_mask(&[3, 2], 3);
        let (_, weights) = mha.forward(&x, &x, &x, Some(&mask)).unwrap();

        // weights: [2, 2, 3, 3]; second sequence's last key is padded.
        let (heads, q_len, k_len) = (2, 3, 3);
        for h in 0..heads {
            for i in 0..q_len {
                let idx = ((heads + h) * q_len + i) * k_len + 2;
                assert_eq!(weights.data[idx], 0.0);
            }
        }
    }
}
