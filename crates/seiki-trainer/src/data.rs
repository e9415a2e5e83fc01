//! Mini-batch slicing and character dropout.

use std::ops::Range;

use oorandom::Rand32;
use seiki_core::EncodedBatch;

/// Contiguous batch ranges over `len` examples, in order.
///
/// With `keep_partial` unset, a trailing batch shorter than `batch_size` is
/// skipped.
pub fn batch_ranges(
    len: usize,
    batch_size: usize,
    keep_partial: bool,
) -> impl Iterator<Item = Range<usize>> {
    let batch_size = batch_size.max(1);
    let count = if keep_partial {
        len.div_ceil(batch_size)
    } else {
        len / batch_size
    };
    (0..count).map(move |i| i * batch_size..((i + 1) * batch_size).min(len))
}

/// Replaces source characters with the pad id at a fixed rate.
#[derive(Debug, Clone)]
pub struct CharDropout {
    rate: f32,
    pad_id: u32,
    rng: Rand32,
}

impl CharDropout {
    pub fn new(rate: f32, pad_id: u32, seed: u64) -> Self {
        Self {
            rate,
            pad_id,
            rng: Rand32::new(seed),
        }
    }

    /// Drop characters in place; returns how many were replaced.
    ///
    /// Every cell is sampled, padding included, so the draw sequence depends
    /// only on the batch shape.
    pub fn apply(&mut self, batch: &mut EncodedBatch) -> usize {
        let mut dropped = 0;
        for id in batch.ids.iter_mut() {
            if self.rng.rand_float() < self.rate && *id != self.pad_id {
                *id = self.pad_id;
                dropped += 1;
            }
        }
        dropped
    }
}
