//! # Inference Bundle
//!
//! On-disk layout of an exported normalizer:
//!
//! ```text
//! <bundle>/
//!   source_char_dict.txt
//!   target_char_dict.txt
//!   model/
//!     config.json
//!     model.safetensors
//! ```
//!
//! [`Normalizer`] loads such a directory and serves greedy predictions.

use std::fs;
use std::path::Path;

use candle_core::Device;
use tracing::info;

use crate::batch::encode_batch_lossy;
use crate::config::ModelConfig;
use crate::error::{Result, SeikiError};
use crate::model::{ModelMode, Seq2Seq};
use crate::vocab::{CharVocab, VocabKind};

pub const MODEL_DIR: &str = "model";
pub const CONFIG_FILE: &str = "config.json";
pub const WEIGHTS_FILE: &str = "model.safetensors";
pub const SOURCE_VOCAB_FILE: &str = "source_char_dict.txt";
pub const TARGET_VOCAB_FILE: &str = "target_char_dict.txt";

/// Write an inference bundle into `dir`, creating it if needed.
pub fn write_bundle<P: AsRef<Path>>(
    dir: P,
    model: &Seq2Seq,
    source_vocab: &CharVocab,
    target_vocab: &CharVocab,
) -> Result<()> {
    let dir = dir.as_ref();
    let model_dir = dir.join(MODEL_DIR);
    fs::create_dir_all(&model_dir)?;

    let config = serde_json::to_string_pretty(model.config())?;
    fs::write(model_dir.join(CONFIG_FILE), config)?;
    model.save_checkpoint(model_dir.join(WEIGHTS_FILE))?;

    source_vocab.write_to(dir.join(SOURCE_VOCAB_FILE))?;
    target_vocab.write_to(dir.join(TARGET_VOCAB_FILE))?;
    Ok(())
}

/// A loaded bundle ready to normalize strings.
pub struct Normalizer {
    model: Seq2Seq,
    source_vocab: CharVocab,
    target_vocab: CharVocab,
    batch_size: usize,
}

impl Normalizer {
    /// Default number of strings decoded together.
    pub const DEFAULT_BATCH_SIZE: usize = 64;

    /// Load a bundle directory on CPU.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Self::load_on(dir, &Device::Cpu)
    }

    /// Load a bundle directory on `device`.
    pub fn load_on<P: AsRef<Path>>(dir: P, device: &Device) -> Result<Self> {
        let dir = dir.as_ref();
        let model_dir = dir.join(MODEL_DIR);

        let source_vocab = CharVocab::read_from(VocabKind::Source, dir.join(SOURCE_VOCAB_FILE))?;
        let target_vocab = CharVocab::read_from(VocabKind::Target, dir.join(TARGET_VOCAB_FILE))?;

        let config: ModelConfig =
            serde_json::from_str(&fs::read_to_string(model_dir.join(CONFIG_FILE))?)?;
        if config.source_vocab_size != source_vocab.len()
            || config.target_vocab_size != target_vocab.len()
        {
            return Err(SeikiError::InvalidBundle(format!(
                "config expects vocabularies of {}/{} entries, files hold {}/{}",
                config.source_vocab_size,
                config.target_vocab_size,
                source_vocab.len(),
                target_vocab.len()
            )));
        }

        let model = Seq2Seq::from_checkpoint(
            config,
            ModelMode::Eval,
            model_dir.join(WEIGHTS_FILE),
            device,
        )?;
        info!(
            "Loaded normalizer from {} ({} source / {} target ids)",
            dir.display(),
            source_vocab.len(),
            target_vocab.len()
        );

        Ok(Self {
            model,
            source_vocab,
            target_vocab,
            batch_size: Self::DEFAULT_BATCH_SIZE,
        })
    }

    /// Set how many strings are decoded per forward pass.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn source_vocab(&self) -> &CharVocab {
        &self.source_vocab
    }

    pub fn target_vocab(&self) -> &CharVocab {
        &self.target_vocab
    }

    /// Normalize each input string.
    ///
    /// Characters absent from the source vocabulary are read as the
    /// pad/unknown id. Empty inputs normalize to empty strings.
    pub fn normalize<S: AsRef<str>>(&self, inputs: &[S]) -> Result<Vec<String>> {
        let mut out = Vec::with_capacity(inputs.len());
        for chunk in inputs.chunks(self.batch_size) {
            let source = encode_batch_lossy(&self.source_vocab, chunk);
            if source.width == 0 {
                out.extend(std::iter::repeat_n(String::new(), chunk.len()));
                continue;
            }
            out.extend(self.model.translate(&source, &self.target_vocab)?);
        }
        Ok(out)
    }
}
