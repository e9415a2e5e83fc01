//! # Batch Encoding
//!
//! Turns variable-length strings into right-padded id matrices. The width of
//! every matrix is the longest string of that call, so consecutive batches
//! usually have different shapes.

use candle_core::{Device, Tensor};

use crate::error::{Result, SeikiError};
use crate::vocab::CharVocab;

/// Row-major `[rows, width]` id matrix plus the unpadded length of each row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBatch {
    pub ids: Vec<u32>,
    pub lengths: Vec<usize>,
    pub width: usize,
}

impl EncodedBatch {
    /// Pad already-encoded rows to the longest one with 0.
    pub fn from_rows(rows: Vec<Vec<u32>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut ids = vec![0u32; rows.len() * width];
        let mut lengths = Vec::with_capacity(rows.len());

        for (r, row) in rows.iter().enumerate() {
            ids[r * width..r * width + row.len()].copy_from_slice(row);
            lengths.push(row.len());
        }

        Self {
            ids,
            lengths,
            width,
        }
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.lengths.len()
    }

    /// Padded ids of one row.
    pub fn row(&self, r: usize) -> &[u32] {
        &self.ids[r * self.width..(r + 1) * self.width]
    }

    /// Unpadded ids of one row.
    pub fn trimmed_row(&self, r: usize) -> &[u32] {
        &self.row(r)[..self.lengths[r]]
    }

    /// `[rows, width]` u32 tensor.
    pub fn to_tensor(&self, device: &Device) -> Result<Tensor> {
        if self.width == 0 {
            return Err(SeikiError::EmptyBatch { rows: self.rows() });
        }
        Ok(Tensor::from_slice(&self.ids, (self.rows(), self.width), device)?)
    }
}

/// Encode strings with `vocab`; an unmapped character is an error.
pub fn encode_batch<S: AsRef<str>>(vocab: &CharVocab, strings: &[S]) -> Result<EncodedBatch> {
    let rows = strings
        .iter()
        .map(|s| vocab.encode(s.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    Ok(EncodedBatch::from_rows(rows))
}

/// Encode strings with `vocab`, mapping unmapped characters to the pad id.
pub fn encode_batch_lossy<S: AsRef<str>>(vocab: &CharVocab, strings: &[S]) -> EncodedBatch {
    EncodedBatch::from_rows(
        strings
            .iter()
            .map(|s| vocab.encode_lossy(s.as_ref()))
            .collect(),
    )
}

/// A source/target pair of encoded batches used for one optimizer step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiniBatch {
    pub source: EncodedBatch,
    pub target: EncodedBatch,
}

impl MiniBatch {
    /// Encode aligned source and target strings.
    pub fn encode<S: AsRef<str>>(
        source_vocab: &CharVocab,
        target_vocab: &CharVocab,
        sources: &[S],
        targets: &[S],
    ) -> Result<Self> {
        if sources.len() != targets.len() {
            return Err(SeikiError::ShapeMismatch(format!(
                "{} sources but {} targets",
                sources.len(),
                targets.len()
            )));
        }

        Ok(Self {
            source: encode_batch(source_vocab, sources)?,
            target: encode_batch(target_vocab, targets)?,
        })
    }

    /// Number of examples.
    pub fn len(&self) -> usize {
        self.source.rows()
    }

    /// `true` when the batch holds no examples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decoder steps for this batch: longest target plus the END marker.
    pub fn decoder_steps(&self) -> usize {
        self.target.width + 1
    }

    /// Per-example decoder lengths, END included.
    pub fn decoder_lengths(&self) -> Vec<usize> {
        self.target.lengths.iter().map(|l| l + 1).collect()
    }

    /// Teacher-forced decoder input: START followed by the target, `[rows, steps]`.
    pub fn decoder_inputs(&self, start_id: u32) -> Vec<u32> {
        let steps = self.decoder_steps();
        let mut out = Vec::with_capacity(self.len() * steps);
        for r in 0..self.len() {
            out.push(start_id);
            out.extend_from_slice(self.target.row(r));
        }
        out
    }

    /// Decoder labels: the target, END at each row's true length, 0 beyond.
    pub fn decoder_labels(&self, end_id: u32) -> Vec<u32> {
        let steps = self.decoder_steps();
        let mut out = vec![0u32; self.len() * steps];
        for r in 0..self.len() {
            let row = self.target.trimmed_row(r);
            let dst = &mut out[r * steps..(r + 1) * steps];
            dst[..row.len()].copy_from_slice(row);
            dst[row.len()] = end_id;
        }
        out
    }
}

/// `[rows, steps]` f32 mask with 1.0 where `t < lengths[row]`.
pub fn sequence_mask(lengths: &[usize], steps: usize, device: &Device) -> Result<Tensor> {
    let mask: Vec<f32> = lengths
        .iter()
        .flat_map(|&len| (0..steps).map(move |t| if t < len { 1.0 } else { 0.0 }))
        .collect();
    Ok(Tensor::from_vec(mask, (lengths.len(), steps), device)?)
}
