//! Per-epoch checkpoints of the training instance.
//!
//! Files are named `checkpoint-{epoch}.safetensors`; only the latest one is
//! kept on disk. A store without an explicit directory writes into a private
//! temp dir that is removed when the store is dropped.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use seiki_core::Seq2Seq;
use tempfile::TempDir;
use tracing::debug;

pub struct CheckpointStore {
    dir: PathBuf,
    latest: Option<PathBuf>,
    _scratch: Option<TempDir>,
}

impl CheckpointStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("cannot create checkpoint dir '{}'", dir.display()))?;
        Ok(Self {
            dir,
            latest: None,
            _scratch: None,
        })
    }

    /// Open a store in a fresh temp dir owned by this run.
    pub fn temporary() -> Result<Self> {
        let scratch = tempfile::Builder::new()
            .prefix("seiki-checkpoints-")
            .tempdir()
            .context("cannot create temporary checkpoint dir")?;
        Ok(Self {
            dir: scratch.path().to_path_buf(),
            latest: None,
            _scratch: Some(scratch),
        })
    }

    /// Open `dir` if given, a private temp dir otherwise.
    pub fn open(dir: Option<&Path>) -> Result<Self> {
        match dir {
            Some(dir) => Self::new(dir),
            None => Self::temporary(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the most recent checkpoint written by this store.
    pub fn latest(&self) -> Option<&Path> {
        self.latest.as_deref()
    }

    /// Save `model` as the checkpoint of `epoch` and drop the previous one.
    pub fn save(&mut self, model: &Seq2Seq, epoch: usize) -> Result<PathBuf> {
        let path = self.dir.join(format!("checkpoint-{epoch}.safetensors"));
        let tmp = path.with_extension("safetensors.tmp");

        model
            .save_checkpoint(&tmp)
            .with_context(|| format!("cannot write checkpoint '{}'", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("cannot move checkpoint into '{}'", path.display()))?;

        if let Some(previous) = self.latest.replace(path.clone()) {
            if previous != path {
                if let Err(e) = fs::remove_file(&previous) {
                    debug!("Could not remove old checkpoint {}: {e}", previous.display());
                }
            }
        }
        debug!("Saved checkpoint {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;
    use seiki_core::{CharVocab, ModelConfig, ModelMode};

    fn model() -> Seq2Seq {
        let cfg = ModelConfig::for_vocabs(&CharVocab::source(["ab"]), &CharVocab::target(["ba"]))
            .with_embedding_dim(4)
            .with_hidden_units(4);
        Seq2Seq::new(cfg, ModelMode::Train, &Device::Cpu).unwrap()
    }

    #[test]
    fn test_only_latest_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CheckpointStore::new(dir.path().join("ckpt")).unwrap();
        assert!(store.latest().is_none());

        let model = model();
        let first = store.save(&model, 1).unwrap();
        assert!(first.exists());
        let second = store.save(&model, 2).unwrap();

        assert!(!first.exists());
        assert!(second.exists());
        assert_eq!(store.latest(), Some(second.as_path()));
        assert!(second.ends_with("checkpoint-2.safetensors"));

        let files = fs::read_dir(store.dir()).unwrap().count();
        assert_eq!(files, 1);
    }

    #[test]
    fn test_resaving_same_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CheckpointStore::new(dir.path()).unwrap();
        let model = model();
        store.save(&model, 3).unwrap();
        let path = store.save(&model, 3).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_temporary_stores_are_private_and_cleaned_up() {
        let model = model();
        let mut a = CheckpointStore::open(None).unwrap();
        let mut b = CheckpointStore::open(None).unwrap();
        assert_ne!(a.dir(), b.dir());

        let from_a = a.save(&model, 1).unwrap();
        let from_b = b.save(&model, 1).unwrap();
        assert_ne!(from_a, from_b);

        let dir = a.dir().to_path_buf();
        drop(a);
        assert!(!dir.exists());
        assert!(from_b.exists());
    }
}
