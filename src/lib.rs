//! Horatio: Educational Transformer Encoder Implementation
//!
//! A transformer encoder implemented from scratch in Rust for
//! educational purposes: scaled dot-product attention, multi-head
//! attention, encoder layers, an encoder stack, and a per-position
//! classifier head, built on a minimal hand-rolled tensor kernel so
//! every matrix multiply is visible. Named after Hamlet's steadfast
//! friend, the one who pays attention.
//!
//! # Modules
//!
//! - [`tensor`] - Minimal tensor operations (matmul, softmax, masking)
//! - [`layers`] - Attention, feed-forward, normalization, dropout
//! - [`model`] - Configuration and the sequence classifier
//! - [`error`] - Precondition-violation errors
//!
//! # Example
//!
//! ```rust
//! use horatio::{padding_mask, Config, SequenceClassifier, Tensor};
//!
//! let config = Config::tiny();
//! let mut model = SequenceClassifier::new(&config).unwrap();
//! model.set_training(false);
//!
//! // A batch of two sequences, the second padded after 3 positions.
//! let x = Tensor::ones(vec![2, 5, config.d_model]);
//! let mask = padding_mask(&[5, 3], 5);
//!
//! let logits = model.forward(&x, Some(&mask)).unwrap();
//! assert_eq!(logits.shape, vec![2, 5, config.n_classes]);
//! ```

pub mod error;
pub mod layers;
pub mod model;
pub mod tensor;

// Re-export main types for convenience
pub use error::{ModelError, Result};
pub use layers::{
    padding_mask, relu, scaled_dot_product_attention, Dropout, Encoder, EncoderLayer, FeedForward,
    LayerNorm, Linear, MultiHeadAttention,
};
pub use model::{Config, SequenceClassifier};
pub use tensor::Tensor;
