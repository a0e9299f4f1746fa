use std::sync::Arc;

use rand::Rng;
use tracing::debug;

use crate::config::{SamplerConfig, WindowStart};
use crate::corpus::Corpus;
use crate::errors::SamplerError;
use crate::types::TokenId;

#[derive(Debug, Clone)]
/// Small deterministic RNG (splitmix64) so sample sequences replay exactly per seed.
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64_internal(&mut self) -> u64 {
        let mut z = self.state.wrapping_add(0x9E3779B97F4A7C15);
        self.state = z;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^ (z >> 31)
    }
}

impl rand::RngCore for DeterministicRng {
    fn next_u32(&mut self) -> u32 {
        self.next_u64_internal() as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.next_u64_internal()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        let mut offset = 0;
        while offset < dest.len() {
            let value = self.next_u64_internal();
            let bytes = value.to_le_bytes();
            let remaining = dest.len() - offset;
            let copy_len = remaining.min(bytes.len());
            dest[offset..offset + copy_len].copy_from_slice(&bytes[..copy_len]);
            offset += copy_len;
        }
    }
}

/// Requested window size for a single sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowLength {
    /// Return the chosen document unmodified (the `0` sentinel).
    Natural,
    /// Pad or truncate to exactly this many tokens.
    Tokens(usize),
}

impl From<usize> for WindowLength {
    fn from(length: usize) -> Self {
        if length == 0 {
            Self::Natural
        } else {
            Self::Tokens(length)
        }
    }
}

impl From<WindowLength> for usize {
    fn from(length: WindowLength) -> Self {
        match length {
            WindowLength::Natural => 0,
            WindowLength::Tokens(length) => length,
        }
    }
}

impl TryFrom<i64> for WindowLength {
    type Error = SamplerError;

    fn try_from(length: i64) -> Result<Self, Self::Error> {
        usize::try_from(length)
            .map(Self::from)
            .map_err(|_| SamplerError::InvalidLength(length))
    }
}

/// Samples fixed-length token windows from a corpus without crossing document boundaries.
///
/// Each draw picks a document uniformly (every document is equally likely,
/// whatever its length), then right-pads it with the pad token or truncates it
/// to the requested length. Truncation keeps the prefix unless the config opts
/// into [`WindowStart::RandomOffset`].
///
/// Picking documents uniformly and keeping prefixes only approximates drawing
/// windows from the whole corpus concatenated into one stream: short documents
/// are over-represented relative to their token share, and tokens past the first
/// window of a long document are never returned under `Prefix`.
///
/// The sampler owns its RNG and is not synchronized. Threads that sample
/// concurrently should each own a sampler (seeded independently) over a shared
/// `Arc<Corpus>`.
pub struct ChunkSampler {
    corpus: Arc<Corpus>,
    rng: DeterministicRng,
    seed: u64,
    pad_token: TokenId,
    window_start: WindowStart,
}

impl ChunkSampler {
    /// Create a sampler over `corpus`. Fails when the corpus has no documents.
    pub fn new(corpus: Arc<Corpus>, config: SamplerConfig) -> Result<Self, SamplerError> {
        if corpus.is_empty() {
            return Err(SamplerError::InvalidCorpus);
        }
        let seed = match config.seed {
            Some(seed) => seed,
            None => {
                let seed = rand::random::<u64>();
                debug!(seed, "no sampler seed configured; drew one from the thread rng");
                seed
            }
        };
        debug!(
            seed,
            documents = corpus.len(),
            pad_token = config.pad_token,
            window_start = ?config.window_start,
            "chunk sampler ready"
        );
        Ok(Self {
            corpus,
            rng: DeterministicRng::new(seed),
            seed,
            pad_token: config.pad_token,
            window_start: config.window_start,
        })
    }

    /// Shorthand for a prefix-truncating sampler with a fixed seed.
    pub fn with_seed(
        corpus: Arc<Corpus>,
        pad_token: TokenId,
        seed: u64,
    ) -> Result<Self, SamplerError> {
        Self::new(corpus, SamplerConfig::new(pad_token).with_seed(seed))
    }

    /// Seed the RNG started from; replaying it reproduces the sample sequence.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Pad token used to fill short documents.
    pub fn pad_token(&self) -> TokenId {
        self.pad_token
    }

    /// Shared corpus this sampler draws from.
    pub fn corpus(&self) -> &Arc<Corpus> {
        &self.corpus
    }

    /// Draw one window. `0` returns the chosen document as stored.
    pub fn sample(&mut self, length: usize) -> Result<Vec<TokenId>, SamplerError> {
        self.draw(WindowLength::from(length)).map(|(_, tokens)| tokens)
    }

    /// Validate a signed length, then draw one window.
    ///
    /// Negative lengths fail with [`SamplerError::InvalidLength`] before the RNG advances.
    pub fn sample_signed(&mut self, length: i64) -> Result<Vec<TokenId>, SamplerError> {
        let length = WindowLength::try_from(length)?;
        self.draw(length).map(|(_, tokens)| tokens)
    }

    /// Draw one window and report which document it came from.
    pub fn sample_indexed(
        &mut self,
        length: usize,
    ) -> Result<(usize, Vec<TokenId>), SamplerError> {
        self.draw(WindowLength::from(length))
    }

    fn draw(&mut self, length: WindowLength) -> Result<(usize, Vec<TokenId>), SamplerError> {
        let count = self.corpus.len();
        if count == 0 {
            return Err(SamplerError::EmptyCorpus);
        }
        let index = self.rng.random_range(0..count);
        let document = &self.corpus.documents()[index];
        let tokens = match length {
            WindowLength::Natural => document.clone(),
            WindowLength::Tokens(length) if document.len() < length => {
                let mut padded = Vec::with_capacity(length);
                padded.extend_from_slice(document);
                padded.resize(length, self.pad_token);
                padded
            }
            WindowLength::Tokens(length) => {
                let start = match self.window_start {
                    WindowStart::Prefix => 0,
                    WindowStart::RandomOffset => {
                        let max_start = document.len() - length;
                        if max_start == 0 {
                            0
                        } else {
                            self.rng.random_range(0..=max_start)
                        }
                    }
                };
                document[start..start + length].to_vec()
            }
        };
        Ok((index, tokens))
    }

    /// Draw `batch_size` windows of the same length.
    pub fn sample_batch(
        &mut self,
        batch_size: usize,
        length: usize,
    ) -> Result<Vec<Vec<TokenId>>, SamplerError> {
        (0..batch_size).map(|_| self.sample(length)).collect()
    }
}
