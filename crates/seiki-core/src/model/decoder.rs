//! # Attention Decoder
//!
//! LSTM cell wrapped with Luong attention and an output projection. The
//! attention vector of one step is concatenated to the embedded input of the
//! next (input feeding); the first step sees zeros. The cell starts from the
//! zero state.
//!
//! Two ways to drive it:
//! - [`Decoder::teacher_forced`]: the ground-truth previous character feeds
//!   each step, for a fixed number of steps.
//! - [`Decoder::greedy`]: the previous argmax feeds each step until END or
//!   the step cap.

use candle_core::{DType, Device, Tensor, D};
use candle_nn::rnn::{lstm, LSTMConfig, LSTMState, LSTM, RNN};
use candle_nn::{embedding, linear, Embedding, Linear, Module, VarBuilder};

use crate::config::ModelConfig;
use crate::error::Result;
use crate::model::attention::{AttentionMemory, LuongAttention};

/// Recurrent state carried between decoder steps.
#[derive(Debug, Clone)]
pub struct DecoderState {
    pub cell: LSTMState,
    pub attention: Tensor,
}

/// One greedily decoded sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// Predicted ids, END excluded.
    pub ids: Vec<u32>,
    /// `true` if END was produced before the step cap.
    pub terminated: bool,
}

/// Decoder parameters.
#[derive(Debug, Clone)]
pub struct Decoder {
    embedding: Embedding,
    cell: LSTM,
    attention: LuongAttention,
    projection: Linear,
    hidden_units: usize,
}

impl Decoder {
    /// Create the decoder parameters under `vb`.
    pub fn new(config: &ModelConfig, vb: VarBuilder) -> Result<Self> {
        let embedding = embedding(
            config.target_vocab_size,
            config.embedding_dim,
            vb.pp("char_embeddings"),
        )?;
        let cell = lstm(
            config.embedding_dim + config.hidden_units,
            config.hidden_units,
            LSTMConfig::default(),
            vb.pp("cell"),
        )?;
        let attention = LuongAttention::new(config.hidden_units, vb.pp("attention"))?;
        let projection = linear(
            config.hidden_units,
            config.target_vocab_size,
            vb.pp("projection"),
        )?;

        Ok(Self {
            embedding,
            cell,
            attention,
            projection,
            hidden_units: config.hidden_units,
        })
    }

    /// Attention parameters, used to prepare the encoder memory.
    pub fn attention(&self) -> &LuongAttention {
        &self.attention
    }

    /// Zero cell state and zero attention vector.
    pub fn zero_state(&self, batch: usize, device: &Device) -> Result<DecoderState> {
        Ok(DecoderState {
            cell: self.cell.zero_state(batch)?,
            attention: Tensor::zeros((batch, self.hidden_units), DType::F32, device)?,
        })
    }

    /// Advance one step from embedded inputs `[batch, embedding_dim]`.
    ///
    /// Returns logits over the target vocabulary and the next state.
    pub fn step(
        &self,
        embedded: &Tensor,
        state: &DecoderState,
        memory: &AttentionMemory,
    ) -> Result<(Tensor, DecoderState)> {
        let input = Tensor::cat(&[embedded, &state.attention], 1)?;
        let cell = self.cell.step(&input, &state.cell)?;
        let (attention, _) = self.attention.attend(memory, cell.h())?;
        let logits = self.projection.forward(&attention)?;
        Ok((logits, DecoderState { cell, attention }))
    }

    /// Teacher-forced pass over `inputs` (`[batch, steps]`, u32, START first).
    ///
    /// Returns logits `[batch, steps, target_vocab]`.
    pub fn teacher_forced(&self, inputs: &Tensor, memory: &AttentionMemory) -> Result<Tensor> {
        let (batch, steps) = inputs.dims2()?;
        let embedded = self.embedding.forward(inputs)?;
        let mut state = self.zero_state(batch, inputs.device())?;
        let mut logits = Vec::with_capacity(steps);

        for t in 0..steps {
            let x = embedded.narrow(1, t, 1)?.squeeze(1)?.contiguous()?;
            let (step_logits, next) = self.step(&x, &state, memory)?;
            logits.push(step_logits);
            state = next;
        }

        Ok(Tensor::stack(&logits, 1)?)
    }

    /// Greedy autoregressive decoding from START.
    ///
    /// Each row stops at its own END; the loop stops once every row has
    /// ended or after `max_steps` steps.
    pub fn greedy(
        &self,
        memory: &AttentionMemory,
        batch: usize,
        start_id: u32,
        end_id: u32,
        max_steps: usize,
        device: &Device,
    ) -> Result<Vec<Decoded>> {
        let mut decoded = vec![
            Decoded {
                ids: Vec::new(),
                terminated: false,
            };
            batch
        ];
        let mut ids = Tensor::from_vec(vec![start_id; batch], batch, device)?;
        let mut state = self.zero_state(batch, device)?;

        for _ in 0..max_steps {
            let embedded = self.embedding.forward(&ids)?;
            let (logits, next) = self.step(&embedded, &state, memory)?;
            let picked = logits.argmax(D::Minus1)?;

            for (row, id) in picked.to_vec1::<u32>()?.into_iter().enumerate() {
                let out = &mut decoded[row];
                if out.terminated {
                    continue;
                }
                if id == end_id {
                    out.terminated = true;
                } else {
                    out.ids.push(id);
                }
            }

            if decoded.iter().all(|d| d.terminated) {
                break;
            }
            ids = picked;
            state = next;
        }

        Ok(decoded)
    }
}
