//! # Seiki Core
//!
//! Character-level sequence-to-sequence normalization. Turns free-form
//! tokens such as `2020-01-02` into a canonical form such as `01/02/2020`
//! with an LSTM encoder, Luong attention and a greedy LSTM decoder.
//!
//! ## Quick Start
//!
//! ```rust
//! use candle_core::Device;
//! use seiki_core::{encode_batch, CharVocab, ModelConfig, ModelMode, Seq2Seq};
//!
//! let source = CharVocab::source(["2020-01-02"]);
//! let target = CharVocab::target(["01/02/2020"]);
//! let config = ModelConfig::for_vocabs(&source, &target)
//!     .with_embedding_dim(8)
//!     .with_hidden_units(8);
//! let model = Seq2Seq::new(config, ModelMode::Eval, &Device::Cpu).unwrap();
//!
//! let batch = encode_batch(&source, &["2020-01-02"]).unwrap();
//! let out = model.translate(&batch, &target).unwrap();
//! assert_eq!(out.len(), 1);
//! ```
pub mod batch;
pub mod bundle;
pub mod config;
pub mod error;
pub mod model;
pub mod optim;
pub mod vocab;

// Re-export primary API
pub use batch::{encode_batch, encode_batch_lossy, sequence_mask, EncodedBatch, MiniBatch};
pub use bundle::{write_bundle, Normalizer};
pub use config::ModelConfig;
pub use error::{Result, SeikiError};
pub use model::{Decoded, ModelMode, Seq2Seq};
pub use optim::{ParamsRmsProp, RmsProp};
pub use vocab::{CharVocab, VocabKind, END_CHAR, PAD_CHAR, START_CHAR};
