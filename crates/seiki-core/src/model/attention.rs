//! # Luong Attention
//!
//! Multiplicative attention over encoder outputs:
//!
//! ```text
//! keys      = W_m · encoder_outputs
//! score_s   = h_dec · keys_s            (−1e9 at padded positions)
//! alpha     = softmax(score)
//! context   = Σ_s alpha_s · encoder_outputs_s
//! attention = W_a · [h_dec ; context]
//! ```

use candle_core::{Tensor, D};
use candle_nn::{linear_no_bias, Linear, Module, VarBuilder};

use crate::error::{Result, SeikiError};

const MASKED_SCORE: f64 = -1e9;

/// Encoder outputs prepared once per batch and reused by every decoder step.
#[derive(Debug, Clone)]
pub struct AttentionMemory {
    keys: Tensor,
    values: Tensor,
    score_bias: Tensor,
    steps: usize,
}

impl AttentionMemory {
    /// Number of encoder positions.
    pub fn steps(&self) -> usize {
        self.steps
    }
}

/// Attention parameters.
#[derive(Debug, Clone)]
pub struct LuongAttention {
    memory_layer: Linear,
    attention_layer: Linear,
}

impl LuongAttention {
    /// Create attention parameters for `hidden_units`-wide states.
    pub fn new(hidden_units: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            memory_layer: linear_no_bias(hidden_units, hidden_units, vb.pp("memory_layer"))?,
            attention_layer: linear_no_bias(
                2 * hidden_units,
                hidden_units,
                vb.pp("attention_layer"),
            )?,
        })
    }

    /// Project encoder outputs (`[batch, steps, hidden]`) into keys and turn
    /// the validity mask (`[batch, steps]`) into an additive score bias.
    pub fn memory(&self, encoder_outputs: &Tensor, mask: &Tensor) -> Result<AttentionMemory> {
        let (batch, steps, _) = encoder_outputs.dims3()?;
        if mask.dims() != [batch, steps] {
            return Err(SeikiError::ShapeMismatch(format!(
                "mask {:?} for encoder outputs {:?}",
                mask.dims(),
                encoder_outputs.dims()
            )));
        }
        let keys = self.memory_layer.forward(encoder_outputs)?.contiguous()?;
        let score_bias = mask.affine(-MASKED_SCORE, MASKED_SCORE)?;
        Ok(AttentionMemory {
            keys,
            values: encoder_outputs.contiguous()?,
            score_bias,
            steps,
        })
    }

    /// Alignment distribution `[batch, steps]` for a decoder state `[batch, hidden]`.
    pub fn align(&self, memory: &AttentionMemory, query: &Tensor) -> Result<Tensor> {
        let query = query.unsqueeze(2)?.contiguous()?;
        let scores = memory.keys.matmul(&query)?.squeeze(2)?;
        let scores = scores.add(&memory.score_bias)?;
        Ok(candle_nn::ops::softmax(&scores, D::Minus1)?)
    }

    /// Attention vector `[batch, hidden]` and the alignments used to build it.
    pub fn attend(&self, memory: &AttentionMemory, cell_output: &Tensor) -> Result<(Tensor, Tensor)> {
        let alignments = self.align(memory, cell_output)?;
        let context = alignments
            .unsqueeze(1)?
            .contiguous()?
            .matmul(&memory.values)?
            .squeeze(1)?;
        let fused = Tensor::cat(&[cell_output, &context], 1)?;
        let attention = self.attention_layer.forward(&fused)?;
        Ok((attention, alignments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::sequence_mask;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    #[test]
    fn test_alignments_skip_padding() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let attention = LuongAttention::new(3, vb.pp("attention")).unwrap();

        let outputs = Tensor::randn(0f32, 1f32, (2, 4, 3), &device).unwrap();
        let mask = sequence_mask(&[2, 4], 4, &device).unwrap();
        let memory = attention.memory(&outputs, &mask).unwrap();
        assert_eq!(memory.steps(), 4);

        let query = Tensor::randn(0f32, 1f32, (2, 3), &device).unwrap();
        let (vector, alignments) = attention.attend(&memory, &query).unwrap();
        assert_eq!(vector.dims(), &[2, 3]);

        let rows: Vec<Vec<f32>> = alignments.to_vec2().unwrap();
        assert_eq!(rows[0][2], 0.0);
        assert_eq!(rows[0][3], 0.0);
        for row in &rows {
            let total: f32 = row.iter().sum();
            assert!((total - 1.0).abs() < 1e-5);
        }
        assert!(rows[1].iter().all(|&a| a > 0.0));
    }

    #[test]
    fn test_context_ignores_padded_values() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let attention = LuongAttention::new(2, vb.pp("attention")).unwrap();

        let mask = sequence_mask(&[1], 2, &device).unwrap();
        let clean = Tensor::new(&[[[1f32, 2.], [0., 0.]]], &device).unwrap();
        let noisy = Tensor::new(&[[[1f32, 2.], [50., -50.]]], &device).unwrap();
        let query = Tensor::new(&[[0.5f32, -0.5]], &device).unwrap();

        let (a, _) = attention
            .attend(&attention.memory(&clean, &mask).unwrap(), &query)
            .unwrap();
        let (b, _) = attention
            .attend(&attention.memory(&noisy, &mask).unwrap(), &query)
            .unwrap();
        let diff = a.sub(&b).unwrap().abs().unwrap().max_all().unwrap();
        assert!(diff.to_scalar::<f32>().unwrap() < 1e-6);
    }

    #[test]
    fn test_memory_rejects_mismatched_mask() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let attention = LuongAttention::new(3, vb.pp("attention")).unwrap();

        let outputs = Tensor::zeros((2, 4, 3), DType::F32, &device).unwrap();
        let mask = sequence_mask(&[2, 3], 3, &device).unwrap();
        assert!(matches!(
            attention.memory(&outputs, &mask),
            Err(SeikiError::ShapeMismatch(_))
        ));

        let flat = Tensor::zeros((2, 3), DType::F32, &device).unwrap();
        assert!(attention.memory(&flat, &mask).is_err());
    }
}
