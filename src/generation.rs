//! Conditional generation over a line-oriented test file.
//!
//! Input files alternate content lines (contexts) with separator lines. Each
//! context is fed to a [`TextGenerator`] and the decoded continuation becomes
//! the prediction for that line; separators pass through as a bare newline.

use std::borrow::Cow;
use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{GenerationConfig, HParams, SamplingParams};
use crate::constants::generation::{
    INPUT_PATH_TOKEN, LINES_PER_SET, OUTPUT_PATH_TOKEN, PROGRESS_EVERY_SETS, SEPARATOR_PREDICTION,
    STOP_MARKER,
};
use crate::errors::SamplerError;
use crate::tokenizer::TextEncoder;
use crate::types::TokenId;

/// Model runtime that continues batches of token contexts.
pub trait TextGenerator {
    /// Return one row per context: the context tokens followed by `length` generated tokens.
    fn generate(
        &mut self,
        contexts: &[Vec<TokenId>],
        length: usize,
        params: &SamplingParams,
    ) -> Result<Vec<Vec<TokenId>>, SamplerError>;
}

/// Prediction produced for one input line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Prediction {
    /// Odd (separator) line.
    Separator,
    /// Content line with every generated sample, in generation order.
    Generated {
        /// Zero-based input line number.
        line: usize,
        /// Stop-marker-truncated continuations.
        samples: Vec<String>,
    },
}

impl Prediction {
    /// Text written to the prediction file for this line.
    ///
    /// For content lines this is the last sample generated.
    pub fn text(&self) -> &str {
        match self {
            Prediction::Separator => SEPARATOR_PREDICTION,
            Prediction::Generated { samples, .. } => {
                samples.last().map(String::as_str).unwrap_or_default()
            }
        }
    }
}

/// Whether `save_predictions` wrote the file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The file was created or replaced.
    Written,
    /// The file existed and overwriting was not allowed.
    Skipped,
}

/// Generate predictions for the first `config.max_lines` lines of `reader`.
///
/// Contexts are encoded with their line terminator (CRLF normalized to `\n`);
/// a final line without one is encoded as is.
pub fn generate_predictions<R, G>(
    config: &GenerationConfig,
    hparams: &HParams,
    encoder: &dyn TextEncoder,
    generator: &mut G,
    mut reader: R,
) -> Result<Vec<Prediction>, SamplerError>
where
    R: BufRead,
    G: TextGenerator + ?Sized,
{
    let length = config.validate(hparams)?;
    let batches = config.batches_per_context();
    let mut predictions = Vec::new();
    let mut raw_line = String::new();

    for line_idx in 0..config.max_lines {
        raw_line.clear();
        if reader.read_line(&mut raw_line)? == 0 {
            break;
        }
        let prediction = if line_idx % 2 == 0 {
            let context = encoder.encode(&context_text(&raw_line))?;
            let mut samples = Vec::with_capacity(config.nsamples);
            for _ in 0..batches {
                let rows = vec![context.clone(); config.batch_size];
                let outputs = generator.generate(&rows, length, &config.sampling)?;
                if outputs.len() != rows.len() {
                    return Err(SamplerError::Generation(format!(
                        "generator returned {} rows for a batch of {}",
                        outputs.len(),
                        rows.len()
                    )));
                }
                for output in outputs {
                    let continuation = output.get(context.len()..).ok_or_else(|| {
                        SamplerError::Generation(format!(
                            "generated row of {} tokens is shorter than its {} token context",
                            output.len(),
                            context.len()
                        ))
                    })?;
                    let text = encoder.decode(continuation)?;
                    samples.push(truncate_at_stop_marker(&text).to_string());
                }
            }
            debug!(line = line_idx, samples = samples.len(), "generated continuations");
            Prediction::Generated {
                line: line_idx,
                samples,
            }
        } else {
            Prediction::Separator
        };

        if line_idx % (LINES_PER_SET * PROGRESS_EVERY_SETS) == 0 {
            info!(set = line_idx / LINES_PER_SET, "processing input set");
        }
        predictions.push(prediction);
    }
    Ok(predictions)
}

fn context_text(raw_line: &str) -> Cow<'_, str> {
    match raw_line.strip_suffix("\r\n") {
        Some(body) => Cow::Owned(format!("{body}\n")),
        None => Cow::Borrowed(raw_line),
    }
}

/// Concatenate prediction texts in line order.
pub fn render_predictions(predictions: &[Prediction]) -> String {
    predictions.iter().map(Prediction::text).collect()
}

/// Keep only the text before the first stop marker.
pub fn truncate_at_stop_marker(text: &str) -> &str {
    text.split(STOP_MARKER).next().unwrap_or_default()
}

/// Derive the prediction path by swapping the input marker for the output marker.
///
/// Non-UTF-8 paths are rejected rather than rewritten lossily.
pub fn output_path_for(input: &Path) -> Result<PathBuf, SamplerError> {
    let raw = input.to_str().ok_or_else(|| {
        SamplerError::Configuration(format!(
            "input path is not valid UTF-8: {}",
            input.display()
        ))
    })?;
    Ok(PathBuf::from(raw.replace(INPUT_PATH_TOKEN, OUTPUT_PATH_TOKEN)))
}

/// Write predictions, creating parent directories; never clobbers unless `overwrite` is set.
pub fn save_predictions(
    path: &Path,
    contents: &str,
    overwrite: bool,
) -> Result<SaveOutcome, SamplerError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent)?;
        debug!(dir = %parent.display(), "created prediction directory");
    }
    if path.is_file() && !overwrite {
        info!(path = %path.display(), "prediction file already exists; skipping write");
        return Ok(SaveOutcome::Skipped);
    }
    fs::write(path, contents)?;
    info!(path = %path.display(), bytes = contents.len(), "saved predictions");
    Ok(SaveOutcome::Written)
}
