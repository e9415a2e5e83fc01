//! Training hyperparameters.

use std::path::PathBuf;

use seiki_core::{CharVocab, ModelConfig, ParamsRmsProp};
use serde::{Deserialize, Serialize};

use crate::error::TrainError;

/// Everything a training run needs besides the corpora.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub batch_size: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub rms_decay: f64,
    pub rms_epsilon: f64,
    /// Global gradient norm cap.
    pub clip_norm: f64,
    /// Probability of replacing a source character with the pad id.
    pub char_dropout: f32,
    /// Seed of the character-dropout generator.
    pub seed: u64,
    pub embedding_dim: usize,
    pub hidden_units: usize,
    pub encoder_dropout: f32,
    pub max_decode_steps: usize,
    /// Where per-epoch checkpoints are written; a private temp dir when unset.
    pub checkpoint_dir: Option<PathBuf>,
    /// Keep the unzipped bundle here; it must be absent or empty. When unset
    /// the bundle is staged in a temp dir that only the archive outlives.
    pub bundle_dir: Option<PathBuf>,
    /// Zipped export bundle.
    pub output_path: PathBuf,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            epochs: 20,
            learning_rate: 0.001,
            rms_decay: 0.9,
            rms_epsilon: 1e-10,
            clip_norm: 10.0,
            char_dropout: 0.0005,
            seed: 42,
            embedding_dim: 100,
            hidden_units: 256,
            encoder_dropout: 0.3,
            max_decode_steps: 20,
            checkpoint_dir: None,
            bundle_dir: None,
            output_path: PathBuf::from("normalizer.zip"),
        }
    }
}

impl TrainConfig {
    /// Reject configurations that cannot produce an exportable model.
    pub fn validate(&self) -> Result<(), TrainError> {
        if self.batch_size == 0 {
            return Err(TrainError::InvalidConfig("batch_size must be positive".into()));
        }
        if self.epochs == 0 {
            return Err(TrainError::InvalidConfig(
                "at least one epoch is needed to produce a checkpoint".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.char_dropout) {
            return Err(TrainError::InvalidConfig(format!(
                "char_dropout must be in [0, 1], got {}",
                self.char_dropout
            )));
        }
        Ok(())
    }

    /// Model architecture sized for the given vocabularies.
    pub fn model_config(&self, source: &CharVocab, target: &CharVocab) -> ModelConfig {
        ModelConfig::for_vocabs(source, target)
            .with_embedding_dim(self.embedding_dim)
            .with_hidden_units(self.hidden_units)
            .with_encoder_dropout(self.encoder_dropout)
            .with_max_decode_steps(self.max_decode_steps)
    }

    /// Optimizer settings.
    pub fn optimizer(&self) -> ParamsRmsProp {
        ParamsRmsProp {
            lr: self.learning_rate,
            decay: self.rms_decay,
            epsilon: self.rms_epsilon,
            clip_norm: Some(self.clip_norm),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = TrainConfig::default();
        assert_eq!(cfg.batch_size, 20);
        assert_eq!(cfg.epochs, 20);
        assert_eq!(cfg.optimizer(), ParamsRmsProp::default());
        assert_eq!(cfg.output_path, PathBuf::from("normalizer.zip"));
        assert!(cfg.checkpoint_dir.is_none());
        assert!(cfg.bundle_dir.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_model_config_follows_vocabs() {
        let source = CharVocab::source(["ab"]);
        let target = CharVocab::target(["abc"]);
        let model = TrainConfig::default().model_config(&source, &target);
        assert_eq!(model.source_vocab_size, 3);
        assert_eq!(model.target_vocab_size, 5);
        assert_eq!(model.hidden_units, 256);
    }

    #[test]
    fn test_validate() {
        let cfg = TrainConfig {
            epochs: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = TrainConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
