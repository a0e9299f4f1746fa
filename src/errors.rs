use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error type for corpus loading, sampling, and generation failures.
#[derive(Debug, Error)]
pub enum SamplerError {
    /// Sampler constructed over zero documents.
    #[error("cannot build a chunk sampler over a corpus with zero documents")]
    InvalidCorpus,
    /// Sample requested against a corpus with no documents.
    #[error("cannot sample from an empty corpus")]
    EmptyCorpus,
    /// Negative window length.
    #[error("sample length must be non-negative, got {0}")]
    InvalidLength(i64),
    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Invalid glob pattern or unreadable glob entry.
    #[error("invalid path pattern: {0}")]
    Pattern(String),
    /// Malformed pre-tokenized bundle.
    #[error("malformed pre-tokenized file '{}': {details}", path.display())]
    Format {
        /// Offending file.
        path: PathBuf,
        /// What was wrong with it.
        details: String,
    },
    /// Encoder or decoder failure.
    #[error("tokenizer failure: {0}")]
    Tokenizer(String),
    /// Model runtime failure or malformed generator output.
    #[error("generation failure: {0}")]
    Generation(String),
    /// Invalid generation or CLI configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// `hparams.json` parse failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
