//! Thin adapter between the corpus/generation code and an external tokenizer.

use std::path::Path;

use crate::constants::model::TOKENIZER_FILENAME;
use crate::errors::SamplerError;
use crate::types::TokenId;

/// Text <-> token-id conversion consumed by the loader and the generation driver.
pub trait TextEncoder: Send + Sync {
    /// Encode text without adding special tokens.
    fn encode(&self, text: &str) -> Result<Vec<TokenId>, SamplerError>;
    /// Decode ids back to text.
    fn decode(&self, tokens: &[TokenId]) -> Result<String, SamplerError>;
}

/// `TextEncoder` backed by a Hugging Face `tokenizer.json`.
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
}

impl HfTokenizer {
    /// Load a tokenizer from a `tokenizer.json` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SamplerError> {
        let path = path.as_ref();
        let inner = tokenizers::Tokenizer::from_file(path).map_err(|err| {
            SamplerError::Tokenizer(format!("failed to load {}: {err}", path.display()))
        })?;
        Ok(Self { inner })
    }

    /// Load `tokenizer.json` from a model directory.
    pub fn from_model_dir(model_dir: &Path) -> Result<Self, SamplerError> {
        Self::from_file(model_dir.join(TOKENIZER_FILENAME))
    }

    /// Look up the id of a token string (for example the end-of-text marker).
    pub fn token_id(&self, token: &str) -> Option<TokenId> {
        self.inner.token_to_id(token)
    }
}

impl From<tokenizers::Tokenizer> for HfTokenizer {
    fn from(inner: tokenizers::Tokenizer) -> Self {
        Self { inner }
    }
}

impl TextEncoder for HfTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<TokenId>, SamplerError> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|err| SamplerError::Tokenizer(err.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, tokens: &[TokenId]) -> Result<String, SamplerError> {
        self.inner
            .decode(tokens, false)
            .map_err(|err| SamplerError::Tokenizer(err.to_string()))
    }
}
