//! Training loop with a separate evaluation instance.
//!
//! The train instance is optimized batch by batch. After every epoch its
//! parameters go through a checkpoint file into the eval instance, which then
//! scores the dev split with greedy decoding.

use anyhow::Result;
use candle_core::Device;
use candle_nn::Optimizer;
use seiki_core::{
    encode_batch, CharVocab, MiniBatch, ModelConfig, ModelMode, RmsProp, Seq2Seq,
};
use tracing::{debug, info, warn};

use crate::checkpoint::CheckpointStore;
use crate::config::TrainConfig;
use crate::corpus::{Corpus, Datasets};
use crate::data::{batch_ranges, CharDropout};
use crate::error::TrainError;

const PROGRESS_EVERY: usize = 100;

/// Optimization statistics of one pass over the train split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochStats {
    pub batches: usize,
    /// Mean mini-batch loss, `NaN` if no full batch was available.
    pub mean_loss: f32,
    /// Source characters replaced by character dropout.
    pub dropped_chars: usize,
}

/// Outcome of one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochReport {
    /// 1-based epoch number.
    pub epoch: usize,
    pub train: EpochStats,
    pub dev_accuracy: f64,
}

/// Outcome of a full run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub epochs: Vec<EpochReport>,
    pub test_accuracy: f64,
}

impl TrainingReport {
    /// Dev accuracy after the last epoch.
    pub fn final_dev_accuracy(&self) -> Option<f64> {
        self.epochs.last().map(|e| e.dev_accuracy)
    }
}

pub struct Trainer {
    config: TrainConfig,
    model_config: ModelConfig,
    source_vocab: CharVocab,
    target_vocab: CharVocab,
    train_model: Seq2Seq,
    /// Stays empty until the first checkpoint is restored into it.
    eval_model: Option<Seq2Seq>,
    optimizer: RmsProp,
    char_dropout: CharDropout,
    checkpoints: CheckpointStore,
    device: Device,
}

impl Trainer {
    pub fn new(
        config: TrainConfig,
        source_vocab: CharVocab,
        target_vocab: CharVocab,
        device: &Device,
    ) -> Result<Self> {
        config.validate()?;
        let model_config = config.model_config(&source_vocab, &target_vocab);
        let train_model = Seq2Seq::new(model_config.clone(), ModelMode::Train, device)?;
        let optimizer = RmsProp::new(train_model.vars(), config.optimizer())?;
        let char_dropout = CharDropout::new(config.char_dropout, source_vocab.pad_id(), config.seed);
        let checkpoints = CheckpointStore::open(config.checkpoint_dir.as_deref())?;

        info!(
            "Model: {} source / {} target ids, embedding {}, hidden {}",
            model_config.source_vocab_size,
            model_config.target_vocab_size,
            model_config.embedding_dim,
            model_config.hidden_units
        );

        Ok(Self {
            config,
            model_config,
            source_vocab,
            target_vocab,
            train_model,
            eval_model: None,
            optimizer,
            char_dropout,
            checkpoints,
            device: device.clone(),
        })
    }

    /// Build a trainer whose vocabularies cover every split of `data`.
    pub fn from_datasets(config: TrainConfig, data: &Datasets, device: &Device) -> Result<Self> {
        let source_vocab = data.source_vocab();
        let target_vocab = data.target_vocab();
        Self::new(config, source_vocab, target_vocab, device)
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn source_vocab(&self) -> &CharVocab {
        &self.source_vocab
    }

    pub fn target_vocab(&self) -> &CharVocab {
        &self.target_vocab
    }

    /// The inference instance, once an epoch has completed.
    pub fn eval_model(&self) -> Option<&Seq2Seq> {
        self.eval_model.as_ref()
    }

    /// One pass over the full-size batches of `corpus`, in order.
    pub fn train_epoch(&mut self, corpus: &Corpus, epoch: usize) -> Result<EpochStats> {
        let total = corpus.len() / self.config.batch_size;
        let mut loss_sum = 0f32;
        let mut batches = 0usize;
        let mut dropped = 0usize;

        let ranges = batch_ranges(corpus.len(), self.config.batch_size, false);
        for (index, range) in ranges.enumerate() {
            let mut batch = MiniBatch::encode(
                &self.source_vocab,
                &self.target_vocab,
                &corpus.sources[range.clone()],
                &corpus.targets[range],
            )?;
            if batch.source.width == 0 {
                warn!("Skipping batch {} of epoch {epoch}: all sources are empty", index + 1);
                continue;
            }
            dropped += self.char_dropout.apply(&mut batch.source);

            let loss = self.train_model.loss(&batch)?;
            loss_sum += loss.to_scalar::<f32>()?;
            self.optimizer.backward_step(&loss)?;
            batches += 1;

            if batches % PROGRESS_EVERY == 0 {
                info!(
                    "Epoch {epoch}, batch {batches}/{total}, mean loss {:.4}",
                    loss_sum / batches as f32
                );
            }
        }

        let mean_loss = if batches > 0 {
            loss_sum / batches as f32
        } else {
            f32::NAN
        };
        Ok(EpochStats {
            batches,
            mean_loss,
            dropped_chars: dropped,
        })
    }

    /// Checkpoint the train instance and restore it into the eval instance.
    pub fn sync_eval(&mut self, epoch: usize) -> Result<()> {
        let path = self.checkpoints.save(&self.train_model, epoch)?;
        match self.eval_model.as_mut() {
            Some(model) => model.load_checkpoint(&path)?,
            None => {
                self.eval_model = Some(Seq2Seq::from_checkpoint(
                    self.model_config.clone(),
                    ModelMode::Eval,
                    &path,
                    &self.device,
                )?);
            }
        }
        debug!("Eval instance restored from {}", path.display());
        Ok(())
    }

    /// Exact-match accuracy of the eval instance on `corpus`.
    ///
    /// Every example counts, the trailing partial batch included.
    pub fn evaluate(&self, corpus: &Corpus, split: &'static str) -> Result<f64> {
        let model = self.eval_model.as_ref().ok_or(TrainError::EvalNotReady)?;
        if corpus.is_empty() {
            return Err(TrainError::EmptySplit { split }.into());
        }

        let mut correct = 0usize;
        for range in batch_ranges(corpus.len(), self.config.batch_size, true) {
            let sources = &corpus.sources[range.clone()];
            let source = encode_batch(&self.source_vocab, sources)?;
            let predictions = if source.width == 0 {
                vec![String::new(); sources.len()]
            } else {
                model.translate(&source, &self.target_vocab)?
            };
            correct += predictions
                .iter()
                .zip(&corpus.targets[range])
                .filter(|(predicted, expected)| predicted == expected)
                .count();
        }

        Ok(correct as f64 / corpus.len() as f64)
    }

    /// Train for the configured number of epochs, evaluating on dev after
    /// each one and on test at the end.
    pub fn run(&mut self, data: &Datasets) -> Result<TrainingReport> {
        info!(
            "Training on {} examples ({} dev, {} test) for {} epochs",
            data.train.len(),
            data.dev.len(),
            data.test.len(),
            self.config.epochs
        );

        let mut epochs = Vec::with_capacity(self.config.epochs);
        for epoch in 1..=self.config.epochs {
            let train = self.train_epoch(&data.train, epoch)?;
            self.sync_eval(epoch)?;
            let dev_accuracy = self.evaluate(&data.dev, "dev")?;

            info!(
                "Epoch {epoch}/{}: loss {:.4}, dev accuracy {:.2}%",
                self.config.epochs,
                train.mean_loss,
                dev_accuracy * 100.0
            );
            epochs.push(EpochReport {
                epoch,
                train,
                dev_accuracy,
            });
        }

        let test_accuracy = self.evaluate(&data.test, "test")?;
        info!("Test accuracy {:.2}%", test_accuracy * 100.0);

        Ok(TrainingReport {
            epochs,
            test_accuracy,
        })
    }
}
