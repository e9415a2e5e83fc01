//! # Character Encoder
//!
//! Embeds source character ids and runs a single-direction LSTM over them.
//! Rows shorter than the batch width freeze their state once their last
//! character has been consumed, so padding never leaks into the summary.

use candle_core::Tensor;
use candle_nn::rnn::{lstm, LSTMConfig, LSTMState, LSTM, RNN};
use candle_nn::{embedding, Dropout, Embedding, Module, VarBuilder};

use crate::batch::sequence_mask;
use crate::config::ModelConfig;
use crate::error::{Result, SeikiError};

/// Encoder result consumed by the attention mechanism.
#[derive(Debug, Clone)]
pub struct EncoderOutput {
    /// `[batch, steps, hidden]`; zero at padded positions.
    pub outputs: Tensor,
    /// State after each row's last valid character.
    pub state: LSTMState,
    /// `[batch, steps]` f32 validity mask.
    pub mask: Tensor,
}

/// Embedding table plus LSTM cell.
#[derive(Debug, Clone)]
pub struct Encoder {
    embedding: Embedding,
    cell: LSTM,
    dropout: Dropout,
}

impl Encoder {
    /// Create the encoder parameters under `vb`.
    pub fn new(config: &ModelConfig, vb: VarBuilder) -> Result<Self> {
        let embedding = embedding(
            config.source_vocab_size,
            config.embedding_dim,
            vb.pp("char_embeddings"),
        )?;
        let cell = lstm(
            config.embedding_dim,
            config.hidden_units,
            LSTMConfig::default(),
            vb.pp("cell"),
        )?;

        Ok(Self {
            embedding,
            cell,
            dropout: Dropout::new(config.encoder_dropout),
        })
    }

    /// Encode `ids` (`[batch, steps]`, u32) whose true lengths are `lengths`.
    ///
    /// Dropout on the embedded characters is applied only when `train` is set.
    pub fn forward(&self, ids: &Tensor, lengths: &[usize], train: bool) -> Result<EncoderOutput> {
        let (batch, steps) = ids.dims2()?;
        if lengths.len() != batch {
            return Err(SeikiError::ShapeMismatch(format!(
                "{} lengths for a batch of {batch}",
                lengths.len()
            )));
        }
        if steps == 0 {
            return Err(SeikiError::EmptyBatch { rows: batch });
        }

        let embedded = self.embedding.forward(ids)?;
        let embedded = self.dropout.forward(&embedded, train)?;
        let mask = sequence_mask(lengths, steps, ids.device())?;

        let mut state = self.cell.zero_state(batch)?;
        let mut outputs = Vec::with_capacity(steps);

        for t in 0..steps {
            let x = embedded.narrow(1, t, 1)?.squeeze(1)?.contiguous()?;
            let valid = mask.narrow(1, t, 1)?;
            let next = self.cell.step(&x, &state)?;

            outputs.push(next.h().broadcast_mul(&valid)?);
            state = LSTMState::new(
                keep_where(next.h(), state.h(), &valid)?,
                keep_where(next.c(), state.c(), &valid)?,
            );
        }

        Ok(EncoderOutput {
            outputs: Tensor::stack(&outputs, 1)?,
            state,
            mask,
        })
    }
}

/// `new` where `valid` is 1, `old` where it is 0. `valid` is `[batch, 1]`.
fn keep_where(new: &Tensor, old: &Tensor, valid: &Tensor) -> candle_core::Result<Tensor> {
    new.sub(old)?.broadcast_mul(valid)?.add(old)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn tiny_encoder(varmap: &VarMap) -> Encoder {
        let cfg = ModelConfig::new(6, 4)
            .with_embedding_dim(4)
            .with_hidden_units(5);
        let vb = VarBuilder::from_varmap(varmap, DType::F32, &Device::Cpu);
        Encoder::new(&cfg, vb.pp("encoder")).unwrap()
    }

    fn max_abs_diff(a: &Tensor, b: &Tensor) -> f32 {
        a.sub(b)
            .unwrap()
            .abs()
            .unwrap()
            .max_all()
            .unwrap()
            .to_scalar::<f32>()
            .unwrap()
    }

    #[test]
    fn test_output_shapes() {
        let varmap = VarMap::new();
        let encoder = tiny_encoder(&varmap);
        let ids = Tensor::new(&[[1u32, 2, 3], [4, 0, 0]], &Device::Cpu).unwrap();

        let out = encoder.forward(&ids, &[3, 1], false).unwrap();
        assert_eq!(out.outputs.dims(), &[2, 3, 5]);
        assert_eq!(out.state.h().dims(), &[2, 5]);
        assert_eq!(out.mask.dims(), &[2, 3]);
    }

    #[test]
    fn test_padding_does_not_change_final_state() {
        let varmap = VarMap::new();
        let encoder = tiny_encoder(&varmap);

        let alone = Tensor::new(&[[4u32, 5]], &Device::Cpu).unwrap();
        let alone = encoder.forward(&alone, &[2], false).unwrap();

        let padded = Tensor::new(&[[4u32, 5, 0, 0], [1, 2, 3, 1]], &Device::Cpu).unwrap();
        let padded = encoder.forward(&padded, &[2, 4], false).unwrap();

        let h_alone = alone.state.h().get(0).unwrap();
        let h_padded = padded.state.h().get(0).unwrap();
        assert!(max_abs_diff(&h_alone, &h_padded) < 1e-5);

        let c_alone = alone.state.c().get(0).unwrap();
        let c_padded = padded.state.c().get(0).unwrap();
        assert!(max_abs_diff(&c_alone, &c_padded) < 1e-5);
    }

    #[test]
    fn test_padded_outputs_are_zero() {
        let varmap = VarMap::new();
        let encoder = tiny_encoder(&varmap);
        let ids = Tensor::new(&[[1u32, 0, 0]], &Device::Cpu).unwrap();

        let out = encoder.forward(&ids, &[1], false).unwrap();
        let tail = out.outputs.narrow(1, 1, 2).unwrap();
        let total = tail.abs().unwrap().sum_all().unwrap().to_scalar::<f32>().unwrap();
        assert_eq!(total, 0.0);
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let varmap = VarMap::new();
        let encoder = tiny_encoder(&varmap);
        let ids = Tensor::new(&[[1u32, 2]], &Device::Cpu).unwrap();
        assert!(encoder.forward(&ids, &[2, 1], false).is_err());
    }
}
