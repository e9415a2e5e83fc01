//! Export stage: inference bundle directory plus its zip archive.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use seiki_core::write_bundle;
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::TrainError;
use crate::trainer::Trainer;

/// Fail unless `dir` is absent or an empty directory.
pub fn ensure_empty_dir<P: AsRef<Path>>(dir: P) -> Result<()> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(());
    }
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("cannot read bundle dir '{}'", dir.display()))?;
    if entries.next().is_some() {
        return Err(TrainError::BundleDirNotEmpty {
            path: dir.to_path_buf(),
        }
        .into());
    }
    Ok(())
}

/// Write the eval instance and both vocabularies into `dir`, which must be
/// absent or empty.
pub fn export_bundle<P: AsRef<Path>>(trainer: &Trainer, dir: P) -> Result<()> {
    let dir = dir.as_ref();
    let model = trainer.eval_model().ok_or(TrainError::EvalNotReady)?;
    ensure_empty_dir(dir)?;
    write_bundle(dir, model, trainer.source_vocab(), trainer.target_vocab())
        .with_context(|| format!("cannot write bundle to '{}'", dir.display()))?;
    info!("Exported bundle to {}", dir.display());
    Ok(())
}

/// Zip every file under `dir` into `archive`, with `/`-separated paths
/// relative to `dir`.
pub fn zip_dir<P: AsRef<Path>, Q: AsRef<Path>>(dir: P, archive: Q) -> Result<()> {
    let dir = dir.as_ref();
    let archive = archive.as_ref();
    if let Some(parent) = archive.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let file = File::create(archive)
        .with_context(|| format!("cannot create archive '{}'", archive.display()))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    files.sort();

    for path in &files {
        let name = path
            .strip_prefix(dir)?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        zip.start_file(name, options)?;
        let mut input = File::open(path)?;
        io::copy(&mut input, &mut zip)?;
    }
    zip.finish()?;

    info!("Wrote {} files to {}", files.len(), archive.display());
    Ok(())
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zip_dir_relative_names() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = dir.path().join("bundle");
        fs::create_dir_all(bundle.join("model")).unwrap();
        fs::write(bundle.join("a.txt"), "a\n").unwrap();
        fs::write(bundle.join("model").join("b.json"), "{}").unwrap();

        let archive = dir.path().join("out").join("bundle.zip");
        zip_dir(&bundle, &archive).unwrap();

        let mut zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let mut names: Vec<&str> = zip.file_names().collect();
        names.sort();
        assert_eq!(names, vec!["a.txt", "model/b.json"]);

        let mut content = String::new();
        io::Read::read_to_string(&mut zip.by_name("a.txt").unwrap(), &mut content).unwrap();
        assert_eq!(content, "a\n");
    }

    #[test]
    fn test_ensure_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ensure_empty_dir(dir.path().join("absent")).is_ok());
        assert!(ensure_empty_dir(dir.path()).is_ok());

        fs::write(dir.path().join("notes.txt"), "stale").unwrap();
        let err = ensure_empty_dir(dir.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrainError>(),
            Some(TrainError::BundleDirNotEmpty { .. })
        ));
    }

    #[test]
    fn test_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(zip_dir(dir.path().join("missing"), dir.path().join("x.zip")).is_err());
    }
}
