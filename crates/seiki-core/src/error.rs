use thiserror::Error;

/// Errors that can occur during Seiki core operations.
#[derive(Debug, Error)]
pub enum SeikiError {
    /// A character has no id in the vocabulary it is being encoded with.
    #[error("character {character:?} is not in the vocabulary")]
    UnknownCharacter {
        /// The offending character.
        character: char,
    },

    /// An id has no character in the vocabulary it is being decoded with.
    #[error("id {id} is out of range for a vocabulary of {size} entries")]
    UnknownId {
        /// The offending id.
        id: u32,
        /// Number of entries in the vocabulary.
        size: usize,
    },

    /// A batch has no columns, so there is nothing to run the recurrent cell over.
    #[error("batch of {rows} rows has zero width")]
    EmptyBatch {
        /// Number of rows in the batch.
        rows: usize,
    },

    /// Tensor or batch dimensions that must agree do not.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A training-only operation was requested from an inference-mode model.
    #[error("operation requires a model in {expected} mode")]
    WrongMode {
        /// The mode the operation needs.
        expected: &'static str,
    },

    /// An invalid model configuration was provided.
    #[error("invalid model configuration: {0}")]
    InvalidConfig(String),

    /// An exported bundle is incomplete or malformed.
    #[error("invalid bundle: {0}")]
    InvalidBundle(String),

    /// Candle ML framework error.
    #[error("ML framework error: {0}")]
    Candle(#[from] candle_core::Error),

    /// Filesystem error while reading or writing vocabularies or bundles.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Model configuration could not be (de)serialized.
    #[error("config serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Seiki operations.
pub type Result<T> = std::result::Result<T, SeikiError>;
