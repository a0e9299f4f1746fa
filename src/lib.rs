#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Reusable CLI runners shared by binaries and downstream crates.
pub mod apps;
/// Sampler and generation configuration types.
pub mod config;
/// Centralized constants used across the loader, sampler, and generation driver.
pub mod constants;
/// Corpus type and the file/directory/glob corpus loader.
pub mod corpus;
/// Conditional generation driver and prediction output helpers.
pub mod generation;
/// Document-selection skew helpers.
pub mod metrics;
/// Chunk sampler and public sampling API.
pub mod sampler;
/// Tokenizer adapter consumed by the loader and generation driver.
pub mod tokenizer;
/// Shared type aliases.
pub mod types;

mod errors;

pub use config::{GenerationConfig, HParams, SamplerConfig, SamplingParams, WindowStart};
pub use corpus::{Corpus, load_corpus, resolve_paths};
pub use errors::SamplerError;
pub use generation::{Prediction, SaveOutcome, TextGenerator};
pub use sampler::{ChunkSampler, WindowLength};
pub use tokenizer::{HfTokenizer, TextEncoder};
pub use types::{Document, ModelName, TokenId};
