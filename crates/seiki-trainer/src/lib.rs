//! # Seiki Trainer
//!
//! Trains the Seiki character normalizer on tab-separated corpora, scores it
//! on a dev split after every epoch and exports the result as a zipped
//! inference bundle.

pub mod checkpoint;
pub mod config;
pub mod corpus;
pub mod data;
pub mod error;
pub mod export;
pub mod trainer;

use std::path::Path;

use anyhow::{Context, Result};
use candle_core::Device;
use tracing::info;

pub use config::TrainConfig;
pub use corpus::{load_corpus, Corpus, CorpusParser, Datasets};
pub use error::TrainError;
pub use export::{ensure_empty_dir, export_bundle, zip_dir};
pub use trainer::{EpochReport, EpochStats, Trainer, TrainingReport};

/// Full pipeline: load the three splits, train, evaluate, export and zip.
pub fn run_training<P: AsRef<Path>>(
    train: P,
    dev: P,
    test: P,
    config: TrainConfig,
) -> Result<TrainingReport> {
    let data = Datasets::load(train, dev, test)?;
    info!(
        "Loaded {} train / {} dev / {} test examples",
        data.train.len(),
        data.dev.len(),
        data.test.len()
    );

    let bundle_dir = config.bundle_dir.clone();
    let output_path = config.output_path.clone();
    if let Some(dir) = &bundle_dir {
        ensure_empty_dir(dir)?;
    }

    let mut trainer = Trainer::from_datasets(config, &data, &Device::Cpu)?;
    let report = trainer.run(&data)?;

    match bundle_dir {
        Some(dir) => {
            export_bundle(&trainer, &dir)?;
            zip_dir(&dir, &output_path)?;
        }
        None => {
            let staging = tempfile::Builder::new()
                .prefix("seiki-bundle-")
                .tempdir()
                .context("cannot create bundle staging dir")?;
            export_bundle(&trainer, staging.path())?;
            zip_dir(staging.path(), &output_path)?;
        }
    }
    info!("Normalizer written to {}", output_path.display());

    Ok(report)
}
