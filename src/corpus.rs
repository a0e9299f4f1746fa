use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use safetensors::SafeTensors;
use safetensors::tensor::{Dtype, TensorView};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::constants::corpus::{END_OF_TEXT, PRETOKENIZED_EXTENSION};
use crate::errors::SamplerError;
use crate::tokenizer::TextEncoder;
use crate::types::{Document, TokenId};

/// Ordered, immutable collection of tokenized documents.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Corpus {
    documents: Vec<Document>,
}

impl Corpus {
    /// Build a corpus from already tokenized documents.
    pub fn from_documents(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// True when the corpus holds no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Borrow one document by index.
    pub fn get(&self, index: usize) -> Option<&[TokenId]> {
        self.documents.get(index).map(Vec::as_slice)
    }

    /// Borrow all documents in load order.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Total token count across documents.
    pub fn total_tokens(&self) -> usize {
        self.documents.iter().map(Vec::len).sum()
    }
}

/// Resolve a file, directory (walked recursively), or glob pattern into a sorted file list.
pub fn resolve_paths(pattern: &str) -> Result<Vec<PathBuf>, SamplerError> {
    let candidate = Path::new(pattern);
    if candidate.is_file() {
        return Ok(vec![candidate.to_path_buf()]);
    }

    let mut paths = Vec::new();
    if candidate.is_dir() {
        for entry in WalkDir::new(candidate)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
        {
            paths.push(entry.into_path());
        }
    } else {
        let entries =
            glob::glob(pattern).map_err(|err| SamplerError::Pattern(format!("{pattern}: {err}")))?;
        for entry in entries {
            let path = entry.map_err(|err| SamplerError::Pattern(err.to_string()))?;
            if path.is_file() {
                paths.push(path);
            }
        }
    }
    paths.sort();
    Ok(paths)
}

/// Load every file matched by `pattern` into a corpus.
///
/// `.safetensors` bundles contribute one document per stored tensor. Any other
/// file is read as text, suffixed with the end-of-text marker, and encoded.
pub fn load_corpus(pattern: &str, encoder: &dyn TextEncoder) -> Result<Corpus, SamplerError> {
    let paths = resolve_paths(pattern)?;
    let mut documents = Vec::new();
    for path in &paths {
        if is_pretokenized(path) {
            let loaded = load_pretokenized(path)?;
            debug!(
                path = %path.display(),
                documents = loaded.len(),
                "loaded pre-tokenized file"
            );
            documents.extend(loaded);
        } else {
            let text = fs::read_to_string(path)?;
            let tokens = encoder.encode(&format!("{text}{END_OF_TEXT}"))?;
            debug!(path = %path.display(), tokens = tokens.len(), "encoded text file");
            documents.push(tokens);
        }
    }
    let corpus = Corpus::from_documents(documents);
    info!(
        pattern,
        files = paths.len(),
        documents = corpus.len(),
        tokens = corpus.total_tokens(),
        "corpus loaded"
    );
    Ok(corpus)
}

/// True if the path carries the reserved pre-tokenized extension (case-insensitive).
pub fn is_pretokenized(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(PRETOKENIZED_EXTENSION))
        .unwrap_or(false)
}

/// Read a pre-tokenized bundle: each stored tensor becomes one flattened document.
pub fn load_pretokenized(path: &Path) -> Result<Vec<Document>, SamplerError> {
    let bytes = fs::read(path)?;
    let tensors = SafeTensors::deserialize(&bytes).map_err(|err| SamplerError::Format {
        path: path.to_path_buf(),
        details: err.to_string(),
    })?;
    let mut named = tensors.tensors();
    named.sort_by(|(left, _), (right, _)| compare_array_names(left, right));
    named
        .iter()
        .map(|(name, view)| {
            tensor_tokens(view).map_err(|details| SamplerError::Format {
                path: path.to_path_buf(),
                details: format!("array '{name}': {details}"),
            })
        })
        .collect()
}

fn tensor_tokens(view: &TensorView<'_>) -> Result<Document, String> {
    let data = view.data();
    match view.dtype() {
        Dtype::U8 => Ok(data.iter().map(|&byte| TokenId::from(byte)).collect()),
        Dtype::U16 => Ok(data
            .chunks_exact(2)
            .map(|raw| TokenId::from(u16::from_le_bytes([raw[0], raw[1]])))
            .collect()),
        Dtype::U32 => Ok(data
            .chunks_exact(4)
            .map(|raw| u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
            .collect()),
        Dtype::I16 => data
            .chunks_exact(2)
            .map(|raw| checked_id(i64::from(i16::from_le_bytes([raw[0], raw[1]]))))
            .collect(),
        Dtype::I32 => data
            .chunks_exact(4)
            .map(|raw| checked_id(i64::from(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))))
            .collect(),
        Dtype::I64 => data
            .chunks_exact(8)
            .map(|raw| checked_id(i64::from_le_bytes(eight_bytes(raw))))
            .collect(),
        Dtype::U64 => data
            .chunks_exact(8)
            .map(|raw| {
                let value = u64::from_le_bytes(eight_bytes(raw));
                TokenId::try_from(value).map_err(|_| format!("token id {value} out of range"))
            })
            .collect(),
        other => Err(format!("unsupported dtype {other:?}, expected an integer type")),
    }
}

fn eight_bytes(raw: &[u8]) -> [u8; 8] {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(raw);
    buf
}

fn checked_id(value: i64) -> Result<TokenId, String> {
    TokenId::try_from(value).map_err(|_| format!("token id {value} out of range"))
}

/// Orders `arr_2` before `arr_10`; names without a numeric suffix sort lexically.
fn compare_array_names(left: &str, right: &str) -> Ordering {
    let (left_stem, left_num) = split_numeric_suffix(left);
    let (right_stem, right_num) = split_numeric_suffix(right);
    left_stem
        .cmp(right_stem)
        .then_with(|| left_num.cmp(&right_num))
        .then_with(|| left.cmp(right))
}

fn split_numeric_suffix(name: &str) -> (&str, Option<u64>) {
    let stem = name.trim_end_matches(|ch: char| ch.is_ascii_digit());
    let digits = &name[stem.len()..];
    (stem, digits.parse().ok())
}
