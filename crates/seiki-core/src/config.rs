//! Model hyperparameters.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SeikiError};
use crate::vocab::CharVocab;

/// Architecture of the sequence model.
///
/// Stored next to the weights in an exported bundle so the same network can
/// be rebuilt before loading them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Number of source ids, pad sentinel included.
    pub source_vocab_size: usize,
    /// Number of target ids, START and END included.
    pub target_vocab_size: usize,
    /// Width of both character embedding tables.
    pub embedding_dim: usize,
    /// Hidden units of the encoder cell, decoder cell and attention layer.
    pub hidden_units: usize,
    /// Drop probability applied to embedded source characters while training.
    pub encoder_dropout: f32,
    /// Upper bound on greedy decoding steps.
    pub max_decode_steps: usize,
}

impl ModelConfig {
    /// Create a configuration sized for the given vocabularies.
    pub fn new(source_vocab_size: usize, target_vocab_size: usize) -> Self {
        Self {
            source_vocab_size,
            target_vocab_size,
            embedding_dim: 100,
            hidden_units: 256,
            encoder_dropout: 0.3,
            max_decode_steps: 20,
        }
    }

    /// Create a configuration sized for a pair of vocabularies.
    pub fn for_vocabs(source: &CharVocab, target: &CharVocab) -> Self {
        Self::new(source.len(), target.len())
    }

    /// Set the embedding width.
    pub fn with_embedding_dim(mut self, dim: usize) -> Self {
        self.embedding_dim = dim;
        self
    }

    /// Set the number of hidden units.
    pub fn with_hidden_units(mut self, units: usize) -> Self {
        self.hidden_units = units;
        self
    }

    /// Set the encoder input drop probability.
    pub fn with_encoder_dropout(mut self, p: f32) -> Self {
        self.encoder_dropout = p;
        self
    }

    /// Set the greedy decoding step cap.
    pub fn with_max_decode_steps(mut self, steps: usize) -> Self {
        self.max_decode_steps = steps;
        self
    }

    /// Reject configurations the model cannot be built from.
    pub fn validate(&self) -> Result<()> {
        if self.source_vocab_size == 0 {
            return Err(SeikiError::InvalidConfig(
                "source vocabulary must hold at least the pad id".into(),
            ));
        }
        if self.target_vocab_size < 2 {
            return Err(SeikiError::InvalidConfig(
                "target vocabulary must hold START and END".into(),
            ));
        }
        if self.embedding_dim == 0 || self.hidden_units == 0 {
            return Err(SeikiError::InvalidConfig(
                "embedding_dim and hidden_units must be positive".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.encoder_dropout) {
            return Err(SeikiError::InvalidConfig(format!(
                "encoder_dropout must be in [0, 1), got {}",
                self.encoder_dropout
            )));
        }
        if self.max_decode_steps == 0 {
            return Err(SeikiError::InvalidConfig(
                "max_decode_steps must be positive".into(),
            ));
        }
        Ok(())
    }

    /// START id for this target vocabulary size.
    pub fn start_id(&self) -> u32 {
        (self.target_vocab_size - 2) as u32
    }

    /// END id for this target vocabulary size.
    pub fn end_id(&self) -> u32 {
        (self.target_vocab_size - 1) as u32
    }
}
