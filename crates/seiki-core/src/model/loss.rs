//! Masked sequence cross-entropy.

use candle_core::{Tensor, D};

use crate::error::{Result, SeikiError};

/// Sparse cross-entropy over `[batch, steps, vocab]` logits.
///
/// Positions where `mask` (`[batch, steps]`, f32) is zero contribute nothing.
/// The masked sum is divided by `batch * steps`, padded positions included.
pub fn masked_cross_entropy(logits: &Tensor, labels: &Tensor, mask: &Tensor) -> Result<Tensor> {
    let (batch, steps, _) = logits.dims3()?;
    if labels.dims() != [batch, steps] || mask.dims() != [batch, steps] {
        return Err(SeikiError::ShapeMismatch(format!(
            "logits {:?}, labels {:?}, mask {:?}",
            logits.dims(),
            labels.dims(),
            mask.dims()
        )));
    }

    let log_probs = candle_nn::ops::log_softmax(logits, D::Minus1)?;
    let picked = log_probs
        .gather(&labels.unsqueeze(D::Minus1)?.contiguous()?, D::Minus1)?
        .squeeze(D::Minus1)?;
    let total = picked.neg()?.mul(mask)?.sum_all()?;
    Ok(total.affine(1.0 / (batch * steps) as f64, 0.0)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::sequence_mask;
    use candle_core::Device;

    const VOCAB: usize = 5;

    fn one_hot_logits(rows: &[Vec<u32>], steps: usize, scale: f32) -> Tensor {
        let mut data = vec![0f32; rows.len() * steps * VOCAB];
        for (b, row) in rows.iter().enumerate() {
            for (t, &id) in row.iter().enumerate() {
                data[(b * steps + t) * VOCAB + id as usize] = scale;
            }
        }
        Tensor::from_vec(data, (rows.len(), steps, VOCAB), &Device::Cpu).unwrap()
    }

    #[test]
    fn test_perfect_projection_has_zero_loss() {
        let device = Device::Cpu;
        let labels = vec![vec![1u32, 2, 4], vec![3, 4, 0]];
        let logits = one_hot_logits(&labels, 3, 1e4);
        let flat: Vec<u32> = labels.iter().flatten().copied().collect();
        let labels_t = Tensor::from_vec(flat, (2, 3), &device).unwrap();
        let mask = sequence_mask(&[3, 2], 3, &device).unwrap();

        let loss = masked_cross_entropy(&logits, &labels_t, &mask).unwrap();
        assert!(loss.to_scalar::<f32>().unwrap().abs() < 1e-6);
    }

    #[test]
    fn test_padded_positions_are_ignored() {
        let device = Device::Cpu;
        // Second row's last position predicts 2 but the label says 0.
        let predicted = vec![vec![1u32, 2, 4], vec![3, 4, 2]];
        let logits = one_hot_logits(&predicted, 3, 1e4);
        let labels = Tensor::new(&[[1u32, 2, 4], [3, 4, 0]], &device).unwrap();

        let masked = sequence_mask(&[3, 2], 3, &device).unwrap();
        let loss = masked_cross_entropy(&logits, &labels, &masked).unwrap();
        assert!(loss.to_scalar::<f32>().unwrap().abs() < 1e-6);

        let full = sequence_mask(&[3, 3], 3, &device).unwrap();
        let loss = masked_cross_entropy(&logits, &labels, &full).unwrap();
        assert!(loss.to_scalar::<f32>().unwrap() > 1.0);
    }

    #[test]
    fn test_uniform_logits_normalized_by_batch_and_steps() {
        let device = Device::Cpu;
        let logits = Tensor::zeros((2, 4, VOCAB), candle_core::DType::F32, &device).unwrap();
        let labels = Tensor::zeros((2, 4), candle_core::DType::U32, &device).unwrap();
        let mask = sequence_mask(&[4, 2], 4, &device).unwrap();

        let loss = masked_cross_entropy(&logits, &labels, &mask).unwrap();
        let expected = 6.0 * (VOCAB as f32).ln() / 8.0;
        assert!((loss.to_scalar::<f32>().unwrap() - expected).abs() < 1e-5);
    }

    #[test]
    fn test_shape_mismatch() {
        let device = Device::Cpu;
        let logits = Tensor::zeros((2, 4, VOCAB), candle_core::DType::F32, &device).unwrap();
        let labels = Tensor::zeros((2, 3), candle_core::DType::U32, &device).unwrap();
        let mask = sequence_mask(&[3, 2], 4, &device).unwrap();
        assert!(masked_cross_entropy(&logits, &labels, &mask).is_err());
    }
}
