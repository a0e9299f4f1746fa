use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::generation::DEFAULT_MAX_LINES;
use crate::constants::model::{DEFAULT_MODEL_NAME, DEFAULT_MODELS_DIR, HPARAMS_FILENAME};
use crate::errors::SamplerError;
use crate::types::{ModelName, TokenId};

/// Where a window starts inside a document longer than the requested length.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WindowStart {
    /// Always take the first `length` tokens.
    #[default]
    Prefix,
    /// Draw the start offset uniformly so any full window of the document can be returned.
    RandomOffset,
}

/// Chunk sampler configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SamplerConfig {
    /// RNG seed; `None` draws one from the thread RNG (see `ChunkSampler::seed`).
    pub seed: Option<u64>,
    /// Token used to right-pad documents shorter than the requested window.
    pub pad_token: TokenId,
    /// Truncation policy for documents longer than the requested window.
    pub window_start: WindowStart,
}

impl SamplerConfig {
    /// Create a config with the given pad token, no fixed seed, and prefix truncation.
    pub fn new(pad_token: TokenId) -> Self {
        Self {
            seed: None,
            pad_token,
            window_start: WindowStart::Prefix,
        }
    }

    /// Fix the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Override the truncation policy.
    pub fn with_window_start(mut self, window_start: WindowStart) -> Self {
        self.window_start = window_start;
        self
    }
}

/// Model hyperparameters read from `hparams.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HParams {
    /// Vocabulary size.
    pub n_vocab: usize,
    /// Context window size in tokens.
    pub n_ctx: usize,
    /// Embedding width.
    pub n_embd: usize,
    /// Attention heads per layer.
    pub n_head: usize,
    /// Transformer layers.
    pub n_layer: usize,
}

impl Default for HParams {
    fn default() -> Self {
        Self {
            n_vocab: 50257,
            n_ctx: 1024,
            n_embd: 768,
            n_head: 12,
            n_layer: 12,
        }
    }
}

impl HParams {
    /// Load hyperparameters from a JSON file; absent fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self, SamplerError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Load `hparams.json` from a model directory.
    pub fn from_model_dir(model_dir: &Path) -> Result<Self, SamplerError> {
        Self::load(&model_dir.join(HPARAMS_FILENAME))
    }
}

/// Decoding knobs handed to the model runtime.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SamplingParams {
    /// Boltzmann temperature; lower is more deterministic.
    pub temperature: f32,
    /// Keep only the `top_k` most likely tokens per step; `0` means unrestricted.
    pub top_k: usize,
    /// Nucleus threshold; values above `0.0` enable nucleus sampling and override `top_k`.
    pub top_p: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_k: 0,
            top_p: 0.0,
        }
    }
}

/// Conditional generation configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationConfig {
    /// Checkpoint name (directory under `models_dir`).
    pub model_name: ModelName,
    /// Root directory holding model directories.
    pub models_dir: PathBuf,
    /// Seed forwarded to the runtime.
    pub seed: Option<u64>,
    /// Samples generated per context line.
    pub nsamples: usize,
    /// Rows per generator call; must divide `nsamples`.
    pub batch_size: usize,
    /// Generated tokens per sample; defaults to half the context window.
    pub length: Option<usize>,
    /// Decoding knobs.
    pub sampling: SamplingParams,
    /// Input file with alternating content and separator lines.
    pub filename: PathBuf,
    /// Number of input lines read before stopping.
    pub max_lines: usize,
    /// Whether an existing prediction file may be replaced.
    pub overwrite: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            models_dir: PathBuf::from(DEFAULT_MODELS_DIR),
            seed: None,
            nsamples: 1,
            batch_size: 1,
            length: None,
            sampling: SamplingParams::default(),
            filename: PathBuf::new(),
            max_lines: DEFAULT_MAX_LINES,
            overwrite: false,
        }
    }
}

impl GenerationConfig {
    /// Check batch divisibility and resolve the generation length against the context window.
    pub fn validate(&self, hparams: &HParams) -> Result<usize, SamplerError> {
        if self.batch_size == 0 {
            return Err(SamplerError::Configuration(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        if self.nsamples % self.batch_size != 0 {
            return Err(SamplerError::Configuration(format!(
                "batch_size {} must evenly divide nsamples {}",
                self.batch_size, self.nsamples
            )));
        }
        match self.length {
            None => Ok(hparams.n_ctx / 2),
            Some(length) if length > hparams.n_ctx => Err(SamplerError::Configuration(format!(
                "can't get samples longer than window size: {}",
                hparams.n_ctx
            ))),
            Some(length) => Ok(length),
        }
    }

    /// Generator batches needed per context line.
    pub fn batches_per_context(&self) -> usize {
        self.nsamples / self.batch_size.max(1)
    }

    /// Directory holding this model's files.
    pub fn model_dir(&self) -> PathBuf {
        self.models_dir.join(&self.model_name)
    }
}
