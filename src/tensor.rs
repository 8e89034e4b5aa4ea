//! Tensor Operations for the Encoder
//!
//! A minimal tensor library carrying exactly the operations the encoder
//! needs: batched matrix multiplication, softmax, masking, and the
//! element-wise arithmetic behind layer normalization and residual
//! connections.
//!
//! ## Core Concepts
//!
//! - **Data**: Flat `Vec<f32>` storing all elements in row-major order
//! - **Shape**: Dimensions of the tensor (e.g., `[batch, seq, dim]`)
//! - **Strides**: Step sizes for each dimension to compute flat indices
//!
//! ## Example
//!
//! ```rust
//! use horatio::Tensor;
//!
//! // A 2x3 matrix times a 3x2 matrix
//! let a = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]);
//! let b = Tensor::new(vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0], vec![3, 2]);
//! let c = a.matmul(&b);
//! assert_eq!(c.shape, vec![2, 2]);
//! ```
//!
//! ## Parallelism
//!
//! The expensive operations parallelize with Rayon: matrix multiplication
//! over output rows, batched attention matmuls over (batch, head) pairs,
//! and softmax over rows. Everything else stays sequential so the code
//! reads as close to the math as possible.
//!
//! ## Error Behavior
//!
//! This is the lowest layer of the crate, so shape violations here panic
//! with a descriptive message. The layer modules above validate the
//! preconditions that a caller can plausibly get wrong and return
//! [`ModelError`](crate::ModelError) instead.

use rayon::prelude::*;

/// A multi-dimensional array of `f32` values in row-major layout.
///
/// For shape `[2, 3]` the data is stored as
/// `[row0_col0, row0_col1, row0_col2, row1_col0, row1_col1, row1_col2]`
/// and the strides are `[3, 1]`.
#[derive(Clone, Debug)]
pub struct Tensor {
    /// Flat storage of all tensor elements
    pub data: Vec<f32>,
    /// Shape of the tensor (dimensions)
    pub shape: Vec<usize>,
    /// Strides for each dimension (computed from shape)
    pub strides: Vec<usize>,
}

impl Tensor {
    /// Create a new tensor from flat data and a shape.
    ///
    /// # Panics
    ///
    /// Panics if the product of the shape dimensions doesn't equal the
    /// data length.
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Self {
        let expected: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            expected,
            "Data length ({}) doesn't match shape {:?} (expected {})",
            data.len(),
            shape,
            expected
        );
        let strides = Self::compute_strides(&shape);
        Self {
            data,
            shape,
            strides,
        }
    }

    /// Create a tensor filled with zeros.
    pub fn zeros(shape: Vec<usize>) -> Self {
        let size: usize = shape.iter().product();
        Self::new(vec![0.0; size], shape)
    }

    /// Create a tensor filled with ones.
    pub fn ones(shape: Vec<usize>) -> Self {
        let size: usize = shape.iter().product();
        Self::new(vec![1.0; size], shape)
    }

    /// Row-major strides: for shape `[d0, d1, d2]` the strides are
    /// `[d1*d2, d2, 1]`.
    fn compute_strides(shape: &[usize]) -> Vec<usize> {
        let mut strides = vec![1; shape.len()];
        for i in (0..shape.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * shape[i + 1];
        }
        strides
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Matrix multiplication.
    ///
    /// Supports the two cases attention needs:
    ///
    /// - **2D × 2D**: standard matrix multiplication, `[m, k] @ [k, n] -> [m, n]`,
    ///   with output rows computed in parallel.
    /// - **4D × 4D**: batched multiplication for attention,
    ///   `[batch, heads, m, k] @ [batch, heads, k, n] -> [batch, heads, m, n]`,
    ///   with each (batch, head) pair computed in parallel.
    ///
    /// # Panics
    ///
    /// Panics if the inner dimensions disagree or if the ranks are not
    /// one of the supported combinations.
    pub fn matmul(&self, other: &Tensor) -> Tensor {
        // === 2D MATRIX MULTIPLICATION ===
        if self.ndim() == 2 && other.ndim() == 2 {
            assert_eq!(
                self.shape[1], other.shape[0],
                "Matrix dimensions incompatible: [{}, {}] @ [{}, {}]",
                self.shape[0], self.shape[1], other.shape[0], other.shape[1]
            );

            let m = self.shape[0];
            let k = self.shape[1];
            let n = other.shape[1];

            let mut result = vec![0.0; m * n];
            result
                .par_chunks_mut(n)
                .enumerate()
                .for_each(|(i, out_row)| {
                    let a_row = &self.data[i * k..(i + 1) * k];
                    for (l, &a_val) in a_row.iter().enumerate() {
                        let b_row = &other.data[l * n..(l + 1) * n];
                        for (out, &b_val) in out_row.iter_mut().zip(b_row) {
                            *out += a_val * b_val;
                        }
                    }
                });

            return Tensor::new(result, vec![m, n]);
        }

        // === 4D BATCHED MATRIX MULTIPLICATION (for attention) ===
        if self.ndim() == 4 && other.ndim() == 4 {
            assert_eq!(
                &self.shape[..2],
                &other.shape[..2],
                "Batch/head dimensions must match for batched matmul: {:?} @ {:?}",
                self.shape,
                other.shape
            );
            assert_eq!(
                self.shape[3], other.shape[2],
                "Inner dimensions must match for batched matmul: {:?} @ {:?}",
                self.shape, other.shape
            );

            let batch = self.shape[0];
            let heads = self.shape[1];
            let m = self.shape[2];
            let k = self.shape[3];
            let n = other.shape[3];

            let mut result = vec![0.0; batch * heads * m * n];

            // Each (batch, head) pair is an independent m×n matmul.
            result
                .par_chunks_mut(m * n)
                .enumerate()
                .for_each(|(bh, chunk)| {
                    let a_base = bh * m * k;
                    let b_base = bh * k * n;
                    for i in 0..m {
                        let a_row = &self.data[a_base + i * k..a_base + (i + 1) * k];
                        let out_row = &mut chunk[i * n..(i + 1) * n];
                        for (l, &a_val) in a_row.iter().enumerate() {
                            let b_row = &other.data[b_base + l * n..b_base + (l + 1) * n];
                            for (out, &b_val) in out_row.iter_mut().zip(b_row) {
                                *out += a_val * b_val;
                            }
                        }
                    }
                });

            return Tensor::new(result, vec![batch, heads, m, n]);
        }

        panic!(
            "Unsupported matmul shapes: {:?} @ {:?}",
            self.shape, other.shape
        );
    }

    /// Softmax along the last axis.
    ///
    /// Every slice along the last axis becomes a probability distribution:
    /// non-negative entries that sum to 1. Uses the numerically stable
    /// form `exp(x - max(x)) / sum(exp(x - max(x)))`; subtracting the
    /// per-row maximum prevents overflow without changing the result.
    ///
    /// A row consisting entirely of `-inf` (every position masked out)
    /// would divide by zero, so attention requires at least one unmasked
    /// key per query. Rows are computed in parallel.
    pub fn softmax_last(&self) -> Tensor {
        let cols = *self.shape.last().expect("softmax of a 0-d tensor");
        let mut result = vec![0.0; self.data.len()];

        result
            .par_chunks_mut(cols)
            .zip(self.data.par_chunks(cols))
            .for_each(|(out_row, row)| {
                let max = row.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
                let mut sum = 0.0;
                for (out, &x) in out_row.iter_mut().zip(row) {
                    let e = (x - max).exp();
                    *out = e;
                    sum += e;
                }
                for out in out_row.iter_mut() {
                    *out /= sum;
                }
            });

        Tensor::new(result, self.shape.clone())
    }

    /// Element-wise addition with broadcasting.
    ///
    /// Supports the two patterns the encoder uses:
    ///
    /// 1. **Exact match**: same shape (residual connections)
    /// 2. **Broadcast last dim**: `[*, n] + [n]` (bias and shift vectors)
    pub fn add(&self, other: &Tensor) -> Tensor {
        if self.shape == other.shape {
            let result = self
                .data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| a + b)
                .collect();
            return Tensor::new(result, self.shape.clone());
        }

        if self.ndim() > other.ndim() {
            let last = *self.shape.last().unwrap();
            if other.data.len() == last {
                let result = self
                    .data
                    .iter()
                    .enumerate()
                    .map(|(i, &x)| x + other.data[i % last])
                    .collect();
                return Tensor::new(result, self.shape.clone());
            }
        }

        panic!(
            "Unsupported broadcast for add: {:?} + {:?}",
            self.shape, other.shape
        );
    }

    /// Element-wise subtraction.
    ///
    /// Supports same-shape inputs and subtracting a `[.., 1]` column
    /// (per-row statistics such as the mean in layer normalization).
    pub fn sub(&self, other: &Tensor) -> Tensor {
        if self.shape == other.shape {
            let result = self
                .data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| a - b)
                .collect();
            return Tensor::new(result, self.shape.clone());
        }

        // [rows.., n] - [rows.., 1]: one value per row
        if self.is_row_stat(other) {
            let last = *self.shape.last().unwrap();
            let result = self
                .data
                .iter()
                .enumerate()
                .map(|(i, &x)| x - other.data[i / last])
                .collect();
            return Tensor::new(result, self.shape.clone());
        }

        panic!(
            "Unsupported broadcast for sub: {:?} - {:?}",
            self.shape, other.shape
        );
    }

    /// Element-wise division; same broadcast rules as [`Tensor::sub`].
    pub fn div(&self, other: &Tensor) -> Tensor {
        if self.shape == other.shape {
            let result = self
                .data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| a / b)
                .collect();
            return Tensor::new(result, self.shape.clone());
        }

        if self.is_row_stat(other) {
            let last = *self.shape.last().unwrap();
            let result = self
                .data
                .iter()
                .enumerate()
                .map(|(i, &x)| x / other.data[i / last])
                .collect();
            return Tensor::new(result, self.shape.clone());
        }

        panic!(
            "Unsupported broadcast for div: {:?} / {:?}",
            self.shape, other.shape
        );
    }

    /// Element-wise multiplication with last-dim broadcasting
    /// (`[*, n] * [n]`, used for the layer-norm scale).
    pub fn mul(&self, other: &Tensor) -> Tensor {
        if self.shape == other.shape {
            let result = self
                .data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| a * b)
                .collect();
            return Tensor::new(result, self.shape.clone());
        }

        if self.ndim() > other.ndim() {
            let last = *self.shape.last().unwrap();
            if other.data.len() == last {
                let result = self
                    .data
                    .iter()
                    .enumerate()
                    .map(|(i, &x)| x * other.data[i % last])
                    .collect();
                return Tensor::new(result, self.shape.clone());
            }
        }

        panic!(
            "Unsupported broadcast for mul: {:?} * {:?}",
            self.shape, other.shape
        );
    }

    /// True when `other` holds one value per row of `self`
    /// (same leading dims, last dim 1).
    fn is_row_stat(&self, other: &Tensor) -> bool {
        self.ndim() == other.ndim()
            && self.ndim() >= 2
            && other.shape.last() == Some(&1)
            && self.shape[..self.ndim() - 1] == other.shape[..other.ndim() - 1]
    }

    /// Add a scalar to every element.
    pub fn add_scalar(&self, scalar: f32) -> Tensor {
        let result = self.data.iter().map(|&x| x + scalar).collect();
        Tensor::new(result, self.shape.clone())
    }

    /// Multiply every element by a scalar.
    pub fn mul_scalar(&self, scalar: f32) -> Tensor {
        let result = self.data.iter().map(|&x| x * scalar).collect();
        Tensor::new(result, self.shape.clone())
    }

    /// Element-wise square root.
    pub fn sqrt(&self) -> Tensor {
        let result = self.data.iter().map(|&x| x.sqrt()).collect();
        Tensor::new(result, self.shape.clone())
    }

    /// Mean along the last axis.
    ///
    /// With `keepdim` the reduced dimension stays with size 1, so the
    /// result broadcasts back against the input (see [`Tensor::sub`]).
    pub fn mean_last(&self, keepdim: bool) -> Tensor {
        let cols = *self.shape.last().expect("mean of a 0-d tensor");
        let result: Vec<f32> = self
            .data
            .chunks(cols)
            .map(|row| row.iter().sum::<f32>() / cols as f32)
            .collect();
        Tensor::new(result, self.reduced_shape(keepdim))
    }

    /// Population variance along the last axis (biased, divides by N,
    /// the convention layer normalization uses).
    pub fn var_last(&self, keepdim: bool) -> Tensor {
        let cols = *self.shape.last().expect("var of a 0-d tensor");
        let result: Vec<f32> = self
            .data
            .chunks(cols)
            .map(|row| {
                let mean = row.iter().sum::<f32>() / cols as f32;
                row.iter().map(|&x| (x - mean) * (x - mean)).sum::<f32>() / cols as f32
            })
            .collect();
        Tensor::new(result, self.reduced_shape(keepdim))
    }

    fn reduced_shape(&self, keepdim: bool) -> Vec<usize> {
        let mut shape = self.shape.clone();
        if keepdim {
            *shape.last_mut().unwrap() = 1;
        } else {
            shape.pop();
        }
        shape
    }

    /// Reshape to a new shape with the same number of elements.
    ///
    /// # Panics
    ///
    /// Panics if the element counts differ.
    pub fn reshape(&self, new_shape: &[usize]) -> Tensor {
        let new_size: usize = new_shape.iter().product();
        assert_eq!(
            self.data.len(),
            new_size,
            "Cannot reshape {:?} to {:?}: element count mismatch",
            self.shape,
            new_shape
        );
        Tensor::new(self.data.clone(), new_shape.to_vec())
    }

    /// Swap two dimensions (negative indices count from the end).
    ///
    /// Attention uses this to turn `K [batch, heads, seq, head_dim]` into
    /// `Kᵀ [batch, heads, head_dim, seq]` before computing scores.
    pub fn transpose(&self, dim1: isize, dim2: isize) -> Tensor {
        let ndim = self.ndim() as isize;
        let d1 = if dim1 < 0 { ndim + dim1 } else { dim1 } as usize;
        let d2 = if dim2 < 0 { ndim + dim2 } else { dim2 } as usize;

        let mut new_shape = self.shape.clone();
        new_shape.swap(d1, d2);

        // Walk the output in order; for each output index, find the
        // source element by remapping through the swapped strides.
        let mut swapped_strides = self.strides.clone();
        swapped_strides.swap(d1, d2);
        let out_strides = Self::compute_strides(&new_shape);

        let mut result = vec![0.0; self.data.len()];
        for (i, item) in result.iter_mut().enumerate() {
            let mut src = 0;
            let mut rem = i;
            for (dim, &stride) in out_strides.iter().enumerate() {
                let coord = rem / stride;
                rem %= stride;
                src += coord * swapped_strides[dim];
            }
            *item = self.data[src];
        }

        Tensor::new(result, new_shape)
    }

    /// Replace elements where the mask is non-zero with `value`.
    ///
    /// Attention uses this to pin masked-out scores to `-inf` before
    /// softmax. The mask broadcasts against `self` in two ways:
    ///
    /// - a mask with the **same rank**, where each dimension is either
    ///   equal to the corresponding dimension of `self` or 1
    ///   (e.g. a `[batch, 1, 1, k_len]` padding mask applied to
    ///   `[batch, heads, q_len, k_len]` scores);
    /// - a **rank-2 mask** matching the last two dimensions of `self`,
    ///   repeated across all leading dimensions.
    ///
    /// # Panics
    ///
    /// Panics if the mask fits neither pattern.
    pub fn masked_fill(&self, mask: &Tensor, value: f32) -> Tensor {
        if self.shape == mask.shape {
            let result = self
                .data
                .iter()
                .zip(&mask.data)
                .map(|(&x, &m)| if m != 0.0 { value } else { x })
                .collect();
            return Tensor::new(result, self.shape.clone());
        }

        // Rank-2 mask over the trailing two dims, repeated across leading dims.
        if mask.ndim() == 2 && self.ndim() >= 2 && mask.shape == self.shape[self.ndim() - 2..] {
            let tile = mask.data.len();
            let result = self
                .data
                .iter()
                .enumerate()
                .map(|(i, &x)| if mask.data[i % tile] != 0.0 { value } else { x })
                .collect();
            return Tensor::new(result, self.shape.clone());
        }

        // Same-rank mask with size-1 dimensions broadcast.
        if mask.ndim() == self.ndim()
            && mask
                .shape
                .iter()
                .zip(&self.shape)
                .all(|(&m, &s)| m == s || m == 1)
        {
            // Broadcast dims contribute stride 0 when indexing the mask.
            let mask_strides: Vec<usize> = mask
                .strides
                .iter()
                .zip(&mask.shape)
                .map(|(&stride, &dim)| if dim == 1 { 0 } else { stride })
                .collect();

            let result = self
                .data
                .iter()
                .enumerate()
                .map(|(i, &x)| {
                    let mut mask_idx = 0;
                    let mut rem = i;
                    for (dim, &stride) in self.strides.iter().enumerate() {
                        let coord = rem / stride;
                        rem %= stride;
                        mask_idx += coord * mask_strides[dim];
                    }
                    if mask.data[mask_idx] != 0.0 {
                        value
                    } else {
                        x
                    }
                })
                .collect();
            return Tensor::new(result, self.shape.clone());
        }

        panic!(
            "Mask shape {:?} does not broadcast against {:?}",
            mask.shape, self.shape
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_matmul_2d_known_values() {
        let a = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]);
        let b = Tensor::new(vec![5.0, 6.0, 7.0, 8.0], vec![2, 2]);
        let c = a.matmul(&b);
        assert_eq!(c.shape, vec![2, 2]);
        assert_eq!(c.data, vec![19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_matmul_4d_batched_shape() {
        let a = Tensor::ones(vec![2, 3, 4, 5]);
        let b = Tensor::ones(vec![2, 3, 5, 6]);
        let c = a.matmul(&b);
        assert_eq!(c.shape, vec![2, 3, 4, 6]);
        // Every entry is a dot product of two all-ones length-5 vectors.
        assert!(c.data.iter().all(|&x| x == 5.0));
    }

    #[test]
    #[should_panic(expected = "Inner dimensions must match")]
    fn test_matmul_4d_inner_mismatch_panics() {
        let a = Tensor::ones(vec![1, 1, 2, 3]);
        let b = Tensor::ones(vec![1, 1, 4, 2]);
        a.matmul(&b);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let t = Tensor::new(
            vec![1.0, 2.0, 3.0, -1.0, 0.0, 1.0, 100.0, 100.0, 100.0],
            vec![3, 3],
        );
        let s = t.softmax_last();
        for row in s.data.chunks(3) {
            assert_relative_eq!(row.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
            assert!(row.iter().all(|&x| x >= 0.0));
        }
    }

    #[test]
    fn test_softmax_4d_rows_sum_to_one() {
        let t = Tensor::new((0..24).map(|i| i as f32).collect(), vec![1, 2, 3, 4]);
        let s = t.softmax_last();
        for row in s.data.chunks(4) {
            assert_relative_eq!(row.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_softmax_neg_infinity_gets_zero() {
        let t = Tensor::new(vec![0.0, f32::NEG_INFINITY, 0.0], vec![1, 3]);
        let s = t.softmax_last();
        assert_eq!(s.data[1], 0.0);
        assert_relative_eq!(s.data[0], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_add_broadcast_bias() {
        let x = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]);
        let bias = Tensor::new(vec![10.0, 20.0], vec![2]);
        let y = x.add(&bias);
        assert_eq!(y.data, vec![11.0, 22.0, 13.0, 24.0]);
    }

    #[test]
    fn test_sub_row_stat() {
        let x = Tensor::new(vec![1.0, 3.0, 2.0, 4.0], vec![2, 2]);
        let mean = x.mean_last(true);
        assert_eq!(mean.shape, vec![2, 1]);
        let centered = x.sub(&mean);
        assert_eq!(centered.data, vec![-1.0, 1.0, -1.0, 1.0]);
    }

    #[test]
    fn test_var_last() {
        let x = Tensor::new(vec![1.0, 3.0, 5.0, 5.0], vec![2, 2]);
        let v = x.var_last(false);
        assert_eq!(v.shape, vec![2]);
        assert_relative_eq!(v.data[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(v.data[1], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_transpose_2d() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]);
        let tt = t.transpose(0, 1);
        assert_eq!(tt.shape, vec![3, 2]);
        assert_eq!(tt.data, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_transpose_4d_last_two() {
        let t = Tensor::new((0..12).map(|i| i as f32).collect(), vec![1, 2, 2, 3]);
        let tt = t.transpose(-2, -1);
        assert_eq!(tt.shape, vec![1, 2, 3, 2]);
        // First head: [[0,1,2],[3,4,5]] -> [[0,3],[1,4],[2,5]]
        assert_eq!(&tt.data[..6], &[0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
    }

    #[test]
    fn test_masked_fill_rank2_broadcast() {
        let scores = Tensor::ones(vec![2, 2, 2, 2]);
        let mask = Tensor::new(vec![0.0, 1.0, 0.0, 0.0], vec![2, 2]);
        let filled = scores.masked_fill(&mask, -1.0);
        // Position (0, 1) of every (batch, head) slice is filled.
        for slice in filled.data.chunks(4) {
            assert_eq!(slice, &[1.0, -1.0, 1.0, 1.0]);
        }
    }

    #[test]
    fn test_masked_fill_padding_broadcast() {
        // [batch=2, 1, 1, k=3] mask over [2, 2, 2, 3] scores: second
        // sequence has its last key masked.
        let scores = Tensor::ones(vec![2, 2, 2, 3]);
        let mask = Tensor::new(vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0], vec![2, 1, 1, 3]);
        let filled = scores.masked_fill(&mask, 0.0);
        let first_batch = &filled.data[..12];
        let second_batch = &filled.data[12..];
        assert!(first_batch.iter().all(|&x| x == 1.0));
        for row in second_batch.chunks(3) {
            assert_eq!(row, &[1.0, 1.0, 0.0]);
        }
    }

    #[test]
    #[should_panic(expected = "does not broadcast")]
    fn test_masked_fill_bad_mask_panics() {
        let scores = Tensor::ones(vec![2, 2]);
        let mask = Tensor::ones(vec![3]);
        scores.masked_fill(&mask, 0.0);
    }

    #[test]
    fn test_reshape_roundtrip() {
        let t = Tensor::new((0..6).map(|i| i as f32).collect(), vec![2, 3]);
        let r = t.reshape(&[3, 2]).reshape(&[6]);
        assert_eq!(r.shape, vec![6]);
        assert_eq!(r.data, t.data);
    }
}
