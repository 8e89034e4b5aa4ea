//! Neural Network Layers
//!
//! The building blocks of the encoder, one file per concept:
//!
//! - **activation**: ReLU
//! - **linear**: affine projection (used everywhere)
//! - **layer_norm**: feature-axis normalization
//! - **dropout**: stochastic regularization with a train/eval switch
//! - **attention**: scaled dot-product and multi-head attention
//! - **feed_forward**: position-wise two-layer network
//! - **encoder**: encoder layer and encoder stack
//!
//! ## Design Pattern
//!
//! Every layer is a plain struct holding its parameters, with a
//! `forward` method that is a pure function of the input and those
//! parameters. Nothing is retained across calls; layers that can reject
//! bad inputs return `Result`, and layers whose only failure mode is a
//! programming error panic like the tensor kernel does.

pub mod activation;
pub mod attention;
pub mod dropout;
pub mod encoder;
pub mod feed_forward;
pub mod layer_norm;
pub mod linear;

// Re-export main types for convenience
pub use activation::relu;
pub use attention::{padding_mask, scaled_dot_product_attention, MultiHeadAttention};
pub use dropout::Dropout;
pub use encoder::{Encoder, EncoderLayer};
pub use feed_forward::FeedForward;
pub use layer_norm::LayerNorm;
pub use linear::Linear;
