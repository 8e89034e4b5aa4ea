//! Model Configuration and Classifier
//!
//! Ties the encoder stack to a task: a [`SequenceClassifier`] runs the
//! encoder and projects every position to class logits.
//!
//! ## Architecture Overview
//!
//! ```text
//! Input [batch, seq, d_model]
//!     ↓
//! Encoder Layer 1 (self-attention + feed-forward)
//!     ↓
//!     ...
//!     ↓
//! Encoder Layer N
//!     ↓
//! Linear → [batch, seq, n_classes]
//! ```
//!
//! The classifier head is applied independently at every sequence
//! position; there is no pooling. A token-tagging task reads the logits
//! per position, a sequence-level task would pool them downstream.
//!
//! ## Example
//!
//! ```rust
//! use horatio::{Config, SequenceClassifier, Tensor};
//!
//! let config = Config::tiny();
//! let model = SequenceClassifier::new(&config).unwrap();
//!
//! let x = Tensor::ones(vec![1, 5, config.d_model]);
//! let logits = model.forward(&x, None).unwrap();
//! assert_eq!(logits.shape, vec![1, 5, config.n_classes]);
//! ```

use crate::error::{ModelError, Result};
use crate::layers::{Encoder, Linear};
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Architecture hyperparameters.
///
/// # Fields
///
/// - `d_model`: width of the residual stream
/// - `n_heads`: attention heads per layer (must divide `d_model`)
/// - `n_layers`: encoder layers in the stack
/// - `d_ff`: hidden width of the feed-forward network
/// - `n_classes`: output classes of the classifier head
/// - `dropout_rate`: dropout probability during training
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub d_model: usize,
    pub n_heads: usize,
    pub n_layers: usize,
    pub d_ff: usize,
    pub n_classes: usize,
    pub dropout_rate: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self::base()
    }
}

impl Config {
    /// The "base" geometry of the original Transformer paper.
    pub fn base() -> Self {
        Self {
            d_model: 512,
            n_heads: 8,
            n_layers: 6,
            d_ff: 2048,
            n_classes: 2,
            dropout_rate: 0.1,
        }
    }

    /// A small configuration for experiments that should still feel
    /// like a real model.
    pub fn small() -> Self {
        Self {
            d_model: 64,
            n_heads: 4,
            n_layers: 4,
            d_ff: 256,
            n_classes: 2,
            dropout_rate: 0.1,
        }
    }

    /// A tiny configuration for tests and walkthroughs; forward passes
    /// run in microseconds.
    pub fn tiny() -> Self {
        Self {
            d_model: 16,
            n_heads: 2,
            n_layers: 2,
            d_ff: 64,
            n_classes: 2,
            dropout_rate: 0.1,
        }
    }

    /// Check every configuration precondition.
    ///
    /// # Errors
    ///
    /// - [`ModelError::InvalidHeads`] if `d_model` is not divisible by
    ///   `n_heads` (or `n_heads` is zero)
    /// - [`ModelError::InvalidConfig`] for zero dimensions or a dropout
    ///   rate outside `[0.0, 1.0)`
    pub fn validate(&self) -> Result<()> {
        if self.d_model == 0 || self.d_ff == 0 || self.n_classes == 0 {
            return Err(ModelError::InvalidConfig(format!(
                "d_model ({}), d_ff ({}), and n_classes ({}) must all be non-zero",
                self.d_model, self.d_ff, self.n_classes
            )));
        }
        if self.n_heads == 0 || self.d_model % self.n_heads != 0 {
            return Err(ModelError::InvalidHeads {
                d_model: self.d_model,
                n_heads: self.n_heads,
            });
        }
        if !(0.0..1.0).contains(&self.dropout_rate) {
            return Err(ModelError::InvalidConfig(format!(
                "dropout_rate must be in [0.0, 1.0), got {}",
                self.dropout_rate
            )));
        }
        Ok(())
    }

    /// Feature dimension per attention head.
    pub fn head_dim(&self) -> usize {
        self.d_model / self.n_heads
    }

    /// Write the configuration to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }

    /// Read a configuration from a JSON file.
    ///
    /// The result is parsed but not validated; call
    /// [`Config::validate`] (or construct a model, which does) before
    /// trusting it.
    pub fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Encoder stack plus a per-position classifier head.
#[derive(Debug)]
pub struct SequenceClassifier {
    /// The encoder stack
    pub encoder: Encoder,
    /// Projection from `d_model` to class logits
    pub classifier: Linear,
    /// The configuration the model was built from
    pub config: Config,
}

impl SequenceClassifier {
    /// Build a model from a configuration.
    ///
    /// # Errors
    ///
    /// Rejects an invalid configuration (see [`Config::validate`])
    /// before allocating any parameters.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            encoder: Encoder::new(
                config.n_layers,
                config.d_model,
                config.n_heads,
                config.d_ff,
                config.dropout_rate,
            )?,
            classifier: Linear::new(config.d_model, config.n_classes),
            config: config.clone(),
        })
    }

    /// Switch the whole model between training and evaluation mode.
    /// In evaluation mode the forward pass is deterministic.
    pub fn set_training(&mut self, training: bool) {
        self.encoder.set_training(training);
    }

    /// Total learnable parameters (encoder + classifier head).
    pub fn num_parameters(&self) -> usize {
        self.encoder.num_parameters() + self.classifier.num_parameters()
    }

    /// Forward pass: encode, then project every position to logits.
    ///
    /// `x` is `[batch, seq, d_model]`; the optional mask broadcasts to
    /// `[batch, heads, seq, seq]`. Returns `[batch, seq, n_classes]`.
    ///
    /// # Errors
    ///
    /// Propagates shape rejections from the encoder.
    pub fn forward(&self, x: &Tensor, mask: Option<&Tensor>) -> Result<Tensor> {
        let encoded = self.encoder.forward(x, mask)?;
        Ok(self.classifier.forward(&encoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::padding_mask;

    /// The worked end-to-end example: d_model=10, one head, one layer,
    /// sequence length 10, batch 1, two classes.
    fn worked_example_config() -> Config {
        Config {
            d_model: 10,
            n_heads: 1,
            n_layers: 1,
            d_ff: 40,
            n_classes: 2,
            dropout_rate: 0.0,
        }
    }

    #[test]
    fn test_end_to_end_worked_example_shapes() {
        let config = worked_example_config();
        let model = SequenceClassifier::new(&config).unwrap();

        let x = Tensor::ones(vec![1, 10, 10]);

        let encoded = model.encoder.forward(&x, None).unwrap();
        assert_eq!(encoded.shape, vec![1, 10, 10]);

        let logits = model.forward(&x, None).unwrap();
        assert_eq!(logits.shape, vec![1, 10, 2]);
    }

    #[test]
    fn test_divisibility_violation_rejected_before_construction() {
        let config = Config {
            n_heads: 3,
            ..worked_example_config()
        };
        let err = SequenceClassifier::new(&config).unwrap_err();
        assert_eq!(
            err,
            ModelError::InvalidHeads {
                d_model: 10,
                n_heads: 3
            }
        );
    }

    #[test]
    fn test_validate_rejects_zero_dimensions() {
        let config = Config {
            d_model: 0,
            ..Config::tiny()
        };
        assert!(matches!(
            config.validate(),
            Err(ModelError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_dropout_rate_of_one() {
        let config = Config {
            dropout_rate: 1.0,
            ..Config::tiny()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_presets_are_valid() {
        for config in [Config::tiny(), Config::small(), Config::base()] {
            config.validate().unwrap();
        }
    }

    #[test]
    fn test_eval_mode_is_deterministic() {
        let config = Config {
            dropout_rate: 0.5,
            ..Config::tiny()
        };
        let mut model = SequenceClassifier::new(&config).unwrap();
        model.set_training(false);

        let x = Tensor::ones(vec![2, 4, config.d_model]);
        let a = model.forward(&x, None).unwrap();
        let b = model.forward(&x, None).unwrap();
        assert_eq!(a.data, b.data);
    }

    #[test]
    fn test_forward_with_padding_mask() {
        let model = SequenceClassifier::new(&Config {
            dropout_rate: 0.0,
            ..Config::tiny()
        })
        .unwrap();
        let x = Tensor::ones(vec![2, 6, 16]);
        let mask = padding_mask(&[6, 4], 6);
        let logits = model.forward(&x, Some(&mask)).unwrap();
        assert_eq!(logits.shape, vec![2, 6, 2]);
    }

    #[test]
    fn test_num_parameters_counts_everything() {
        let config = worked_example_config();
        let model = SequenceClassifier::new(&config).unwrap();

        // One layer: 4 attention projections (10*10 + 10), two layer
        // norms (2 * 2 * 10), feed-forward (10*40 + 40 + 40*10 + 10),
        // plus the classifier head (10*2 + 2).
        let per_layer = 4 * 110 + 40 + (400 + 40) + (400 + 10);
        assert_eq!(model.num_parameters(), per_layer + 22);
    }

    #[test]
    fn test_config_json_roundtrip() {
        let dir = std::env::temp_dir().join("horatio_config_test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");

        let config = Config::small();
        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);

        fs::remove_file(&path).ok();
    }
}
