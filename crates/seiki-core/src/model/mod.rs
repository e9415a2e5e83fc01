//! # Sequence Model
//!
//! Attention encoder-decoder over characters. A [`Seq2Seq`] owns its own
//! [`VarMap`]; two instances never share parameters. Moving weights between
//! instances goes through a checkpoint file ([`Seq2Seq::save_checkpoint`] /
//! [`Seq2Seq::load_checkpoint`]).

pub mod attention;
pub mod decoder;
pub mod encoder;
pub mod loss;

use std::path::Path;

use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{VarBuilder, VarMap};

use crate::batch::{sequence_mask, EncodedBatch, MiniBatch};
use crate::config::ModelConfig;
use crate::error::{Result, SeikiError};
use crate::vocab::CharVocab;

pub use attention::{AttentionMemory, LuongAttention};
pub use decoder::{Decoded, Decoder, DecoderState};
pub use encoder::{Encoder, EncoderOutput};
pub use loss::masked_cross_entropy;

/// Whether an instance is used for optimization or for inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelMode {
    /// Teacher-forced decoding, encoder dropout active.
    Train,
    /// Greedy decoding only, no dropout.
    Eval,
}

impl ModelMode {
    fn name(self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Eval => "eval",
        }
    }
}

/// Character-level attention encoder-decoder.
pub struct Seq2Seq {
    config: ModelConfig,
    mode: ModelMode,
    varmap: VarMap,
    encoder: Encoder,
    decoder: Decoder,
    device: Device,
}

impl Seq2Seq {
    /// Build a model with freshly initialized parameters.
    pub fn new(config: ModelConfig, mode: ModelMode, device: &Device) -> Result<Self> {
        config.validate()?;

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let encoder = Encoder::new(&config, vb.pp("encoder"))?;
        let decoder = Decoder::new(&config, vb.pp("decoder"))?;

        Ok(Self {
            config,
            mode,
            varmap,
            encoder,
            decoder,
            device: device.clone(),
        })
    }

    /// Build a model whose parameters come from a checkpoint file.
    pub fn from_checkpoint<P: AsRef<Path>>(
        config: ModelConfig,
        mode: ModelMode,
        path: P,
        device: &Device,
    ) -> Result<Self> {
        let mut model = Self::new(config, mode, device)?;
        model.load_checkpoint(path)?;
        Ok(model)
    }

    /// Write every parameter to a safetensors file.
    pub fn save_checkpoint<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.varmap.save(path)?;
        Ok(())
    }

    /// Overwrite every parameter from a safetensors file.
    pub fn load_checkpoint<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.varmap.load(path)?;
        Ok(())
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn mode(&self) -> ModelMode {
        self.mode
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Trainable variables, for building an optimizer.
    pub fn vars(&self) -> Vec<Var> {
        self.varmap.all_vars()
    }

    /// Replace one named parameter, e.g. `decoder.projection.bias`.
    pub fn set_parameter(&mut self, name: &str, value: &Tensor) -> Result<()> {
        self.varmap.set_one(name, value)?;
        Ok(())
    }

    /// Run the encoder and prepare attention memory for a source batch.
    ///
    /// `train` enables encoder dropout; it is ignored on an eval instance.
    pub fn encode(
        &self,
        source: &EncodedBatch,
        train: bool,
    ) -> Result<(EncoderOutput, AttentionMemory)> {
        let ids = source.to_tensor(&self.device)?;
        let train = train && self.mode == ModelMode::Train;
        let encoded = self.encoder.forward(&ids, &source.lengths, train)?;
        let memory = self
            .decoder
            .attention()
            .memory(&encoded.outputs, &encoded.mask)?;
        Ok((encoded, memory))
    }

    /// Teacher-forced logits `[batch, decoder_steps, target_vocab]`.
    pub fn logits(&self, batch: &MiniBatch) -> Result<Tensor> {
        self.require(ModelMode::Train)?;

        let (_, memory) = self.encode(&batch.source, true)?;
        let inputs = Tensor::from_vec(
            batch.decoder_inputs(self.config.start_id()),
            (batch.len(), batch.decoder_steps()),
            &self.device,
        )?;
        self.decoder.teacher_forced(&inputs, &memory)
    }

    /// Scalar training loss for one mini-batch.
    pub fn loss(&self, batch: &MiniBatch) -> Result<Tensor> {
        let logits = self.logits(batch)?;
        let steps = batch.decoder_steps();
        let labels = Tensor::from_vec(
            batch.decoder_labels(self.config.end_id()),
            (batch.len(), steps),
            &self.device,
        )?;
        let mask = sequence_mask(&batch.decoder_lengths(), steps, &self.device)?;
        masked_cross_entropy(&logits, &labels, &mask)
    }

    /// Greedy decoding of a source batch, capped at `max_decode_steps`.
    ///
    /// Never applies dropout, whatever the instance's mode.
    pub fn greedy_decode(&self, source: &EncodedBatch) -> Result<Vec<Decoded>> {
        let (_, memory) = self.encode(source, false)?;
        self.decoder.greedy(
            &memory,
            source.rows(),
            self.config.start_id(),
            self.config.end_id(),
            self.config.max_decode_steps,
            &self.device,
        )
    }

    /// Greedy decoding turned back into text with `target_vocab`.
    pub fn translate(&self, source: &EncodedBatch, target_vocab: &CharVocab) -> Result<Vec<String>> {
        self.greedy_decode(source)?
            .iter()
            .map(|d| target_vocab.decode(&d.ids))
            .collect()
    }

    fn require(&self, expected: ModelMode) -> Result<()> {
        if self.mode != expected {
            return Err(SeikiError::WrongMode {
                expected: expected.name(),
            });
        }
        Ok(())
    }
}
