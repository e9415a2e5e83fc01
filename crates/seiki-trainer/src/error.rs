use thiserror::Error;

/// Fatal conditions of a training run.
#[derive(Debug, Error)]
pub enum TrainError {
    /// A corpus line has no tab-separated source field.
    #[error("line {line}: expected `normalized<TAB>raw`")]
    MissingField {
        /// 1-based line number.
        line: usize,
    },

    /// A split that must be scored has no examples.
    #[error("the {split} split is empty")]
    EmptySplit {
        /// Name of the split.
        split: &'static str,
    },

    /// Evaluation was requested before any checkpoint reached the eval instance.
    #[error("no checkpoint has been loaded into the evaluation model yet")]
    EvalNotReady,

    /// The requested bundle directory already holds files.
    #[error("bundle directory '{}' is not empty", path.display())]
    BundleDirNotEmpty {
        path: std::path::PathBuf,
    },

    /// An invalid training configuration was provided.
    #[error("invalid training configuration: {0}")]
    InvalidConfig(String),

    /// The corpus separator pattern failed to compile.
    #[error("regex compilation error: {0}")]
    Regex(#[from] regex::Error),

    /// Reading a corpus failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
