//! Error Types
//!
//! Every failure in this crate is a precondition violation: either two
//! arrays disagree on a dimension, or a configuration value is impossible
//! (a model dimension that does not divide evenly into heads, a dropout
//! rate outside the valid range). There is nothing to retry or recover
//! from; the offending call is rejected before any arithmetic happens.

use thiserror::Error;

/// Errors raised when a shape or configuration precondition is violated.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    /// Two arrays disagree on a dimension that must match.
    #[error("shape mismatch in {op}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// The operation that rejected its inputs
        op: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    /// An input does not have the rank the operation requires.
    #[error("{op} expects a rank-{expected} array, got shape {got:?}")]
    InvalidRank {
        op: &'static str,
        expected: usize,
        got: Vec<usize>,
    },

    /// The model dimension cannot be split evenly across heads.
    #[error("model dimension {d_model} is not divisible by {n_heads} attention heads")]
    InvalidHeads { d_model: usize, n_heads: usize },

    /// A configuration value is outside its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ModelError>;
