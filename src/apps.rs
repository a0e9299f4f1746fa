use std::collections::HashMap;
use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, error::ErrorKind};

use crate::config::{GenerationConfig, HParams, SamplerConfig, SamplingParams, WindowStart};
use crate::constants::corpus::END_OF_TEXT;
use crate::constants::generation::DEFAULT_MAX_LINES;
use crate::constants::model::{DEFAULT_MODEL_NAME, DEFAULT_MODELS_DIR};
use crate::corpus::load_corpus;
use crate::errors::SamplerError;
use crate::generation::{
    SaveOutcome, TextGenerator, generate_predictions, output_path_for, render_predictions,
    save_predictions,
};
use crate::metrics::selection_skew;
use crate::sampler::{ChunkSampler, WindowLength};
use crate::tokenizer::{HfTokenizer, TextEncoder};
use crate::types::TokenId;

#[derive(Debug, Parser)]
#[command(
    name = "sample_corpus",
    disable_help_subcommand = true,
    about = "Sample fixed-length token windows from a corpus",
    long_about = "Load a corpus from a file, directory, or glob pattern and print windows drawn uniformly over documents.",
    after_help = "Files ending in .safetensors are read as pre-tokenized arrays; all other files are tokenized with --tokenizer."
)]
struct SampleCorpusCli {
    #[arg(long, value_name = "PATH_OR_GLOB", help = "Corpus file, directory, or glob pattern")]
    path: String,
    #[arg(
        long,
        value_name = "TOKENIZER_JSON",
        help = "tokenizer.json used for raw text files"
    )]
    tokenizer: Option<PathBuf>,
    #[arg(long, help = "Optional deterministic seed")]
    seed: Option<u64>,
    #[arg(
        long,
        default_value_t = 0,
        allow_negative_numbers = true,
        help = "Window length in tokens; 0 returns documents unmodified"
    )]
    length: i64,
    #[arg(
        long = "pad-token",
        help = "Token id used to right-pad short documents (default: the tokenizer's end-of-text id)"
    )]
    pad_token: Option<TokenId>,
    #[arg(
        long,
        default_value_t = 4,
        value_parser = parse_positive_usize,
        help = "Number of windows to draw"
    )]
    count: usize,
    #[arg(
        long = "random-offset",
        help = "Draw a random start offset inside long documents instead of the prefix"
    )]
    random_offset: bool,
}

#[derive(Debug, Parser)]
#[command(
    name = "interact",
    disable_help_subcommand = true,
    about = "Generate continuations for every content line of a test file",
    long_about = "Feed each content line of the input file to the model and write the continuations to the matching y_pred file."
)]
struct InteractCli {
    #[arg(long = "model-name", default_value = DEFAULT_MODEL_NAME)]
    model_name: String,
    #[arg(long = "models-dir", default_value = DEFAULT_MODELS_DIR)]
    models_dir: PathBuf,
    #[arg(long, help = "Seed forwarded to the model runtime")]
    seed: Option<u64>,
    #[arg(long, default_value_t = 1, help = "Samples per content line")]
    nsamples: usize,
    #[arg(
        long = "batch-size",
        default_value_t = 1,
        value_parser = parse_positive_usize,
        help = "Rows per model call; must divide --nsamples"
    )]
    batch_size: usize,
    #[arg(long, help = "Generated tokens per sample (default: half the context window)")]
    length: Option<usize>,
    #[arg(long, default_value_t = 1.0)]
    temperature: f32,
    #[arg(long = "top-k", default_value_t = 0, help = "0 means unrestricted")]
    top_k: usize,
    #[arg(long = "top-p", default_value_t = 0.0, help = "Nucleus threshold; overrides --top-k when > 0")]
    top_p: f32,
    #[arg(long, value_name = "X_TEST_FILE", help = "Input file with alternating content and separator lines")]
    filename: PathBuf,
    #[arg(long = "max-lines", default_value_t = DEFAULT_MAX_LINES)]
    max_lines: usize,
    #[arg(long, help = "Replace an existing prediction file")]
    overwrite: bool,
}

impl From<InteractCli> for GenerationConfig {
    fn from(cli: InteractCli) -> Self {
        Self {
            model_name: cli.model_name,
            models_dir: cli.models_dir,
            seed: cli.seed,
            nsamples: cli.nsamples,
            batch_size: cli.batch_size,
            length: cli.length,
            sampling: SamplingParams {
                temperature: cli.temperature,
                top_k: cli.top_k,
                top_p: cli.top_p,
            },
            filename: cli.filename,
            max_lines: cli.max_lines,
            overwrite: cli.overwrite,
        }
    }
}

/// Stand-in encoder for corpora made only of pre-tokenized files.
struct NoTokenizer;

impl TextEncoder for NoTokenizer {
    fn encode(&self, _text: &str) -> Result<Vec<TokenId>, SamplerError> {
        Err(SamplerError::Tokenizer(
            "corpus contains raw text files; pass --tokenizer".to_string(),
        ))
    }

    fn decode(&self, _tokens: &[TokenId]) -> Result<String, SamplerError> {
        Err(SamplerError::Tokenizer("no tokenizer configured".to_string()))
    }
}

/// Explicit `--pad-token` wins; otherwise fall back to the tokenizer's end-of-text id.
fn resolve_pad_token(
    explicit: Option<TokenId>,
    tokenizer: Option<&HfTokenizer>,
) -> Result<TokenId, SamplerError> {
    if let Some(pad_token) = explicit {
        return Ok(pad_token);
    }
    let tokenizer = tokenizer.ok_or_else(|| {
        SamplerError::Configuration("pass --pad-token or --tokenizer".to_string())
    })?;
    tokenizer.token_id(END_OF_TEXT).ok_or_else(|| {
        SamplerError::Configuration(format!(
            "tokenizer has no {END_OF_TEXT} token; pass --pad-token"
        ))
    })
}

/// Load a corpus and print sampled windows plus a document-selection summary.
pub fn run_sample_corpus<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let Some(cli) = parse_cli::<SampleCorpusCli, _>(
        std::iter::once("sample_corpus".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };

    let length = usize::from(WindowLength::try_from(cli.length)?);
    let tokenizer = cli
        .tokenizer
        .as_deref()
        .map(HfTokenizer::from_file)
        .transpose()?;
    let pad_token = resolve_pad_token(cli.pad_token, tokenizer.as_ref())?;
    let encoder: Box<dyn TextEncoder> = match tokenizer {
        Some(tokenizer) => Box::new(tokenizer),
        None => Box::new(NoTokenizer),
    };
    let corpus = Arc::new(load_corpus(&cli.path, encoder.as_ref())?);

    let mut config = SamplerConfig::new(pad_token);
    config.seed = cli.seed;
    if cli.random_offset {
        config = config.with_window_start(WindowStart::RandomOffset);
    }
    let mut sampler = ChunkSampler::new(Arc::clone(&corpus), config)?;
    println!(
        "Sampling {} window(s) from {} document(s) ({} tokens), seed {}",
        cli.count,
        corpus.len(),
        corpus.total_tokens(),
        sampler.seed()
    );

    let mut counts: HashMap<usize, usize> = HashMap::new();
    for idx in 0..cli.count {
        let (document, tokens) = sampler.sample_indexed(length)?;
        *counts.entry(document).or_insert(0) += 1;
        println!("--- sample #{} ---", idx);
        println!("document     : {}", document);
        println!("doc_tokens   : {}", corpus.documents()[document].len());
        println!("window_tokens: {}", tokens.len());
        println!("tokens       : {:?}", tokens);
    }
    print_selection_summary(&counts, corpus.len());
    Ok(())
}

/// Generate predictions for a test file with a caller-supplied model runtime.
///
/// `build_runtime` receives the resolved configuration and hyperparameters and
/// returns the encoder and generator to use. Runtime loading failures are
/// reported through its error.
pub fn run_interact<E, G, Build, I>(
    args_iter: I,
    build_runtime: Build,
) -> Result<(), Box<dyn Error>>
where
    E: TextEncoder,
    G: TextGenerator,
    Build: FnOnce(&GenerationConfig, &HParams) -> Result<(E, G), Box<dyn Error>>,
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let Some(cli) =
        parse_cli::<InteractCli, _>(std::iter::once("interact".to_string()).chain(args_iter))?
    else {
        return Ok(());
    };

    let config = GenerationConfig::from(cli);
    let hparams = HParams::from_model_dir(&config.model_dir())?;
    config.validate(&hparams)?;
    let (encoder, mut generator) = build_runtime(&config, &hparams)?;

    let reader = BufReader::new(File::open(&config.filename)?);
    let predictions = generate_predictions(&config, &hparams, &encoder, &mut generator, reader)?;
    let output_path = output_path_for(&config.filename)?;
    match save_predictions(
        &output_path,
        &render_predictions(&predictions),
        config.overwrite,
    )? {
        SaveOutcome::Written => println!("saved {}", output_path.display()),
        SaveOutcome::Skipped => println!("already exists {}", output_path.display()),
    }
    Ok(())
}

fn print_selection_summary(counts: &HashMap<usize, usize>, document_count: usize) {
    let Some(skew) = selection_skew(counts, document_count) else {
        return;
    };
    println!("--- document selection ---");
    for entry in skew.per_document.iter().filter(|entry| entry.count > 0) {
        println!(
            "document {}: count={} share={:.2}",
            entry.index, entry.count, entry.share
        );
    }
    println!(
        "skew: documents={} total={} min={} max={} mean={:.2} max_uniform_deviation={:.4}",
        skew.documents, skew.total, skew.min, skew.max, skew.mean, skew.max_uniform_deviation
    );
}

fn parse_positive_usize(raw: &str) -> Result<usize, String> {
    let parsed = raw
        .parse::<usize>()
        .map_err(|_| format!("Could not parse '{}' as a positive integer", raw))?;
    if parsed == 0 {
        return Err("value must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_usize_parser_rejects_zero_and_garbage() {
        assert_eq!(parse_positive_usize("3").unwrap(), 3);
        assert!(parse_positive_usize("0").is_err());
        assert!(parse_positive_usize("-2").is_err());
        assert!(parse_positive_usize("abc").is_err());
    }

    #[test]
    fn interact_cli_maps_onto_generation_config() {
        let cli = InteractCli::try_parse_from([
            "interact",
            "--filename",
            "data/X_test.txt",
            "--nsamples",
            "4",
            "--batch-size",
            "2",
            "--top-k",
            "40",
            "--overwrite",
        ])
        .unwrap();
        let config = GenerationConfig::from(cli);
        assert_eq!(config.model_name, DEFAULT_MODEL_NAME);
        assert_eq!(config.nsamples, 4);
        assert_eq!(config.batch_size, 2);
        assert_eq!(config.sampling.top_k, 40);
        assert_eq!(config.sampling.top_p, 0.0);
        assert_eq!(config.length, None);
        assert_eq!(config.max_lines, DEFAULT_MAX_LINES);
        assert!(config.overwrite);
    }

    #[test]
    fn sample_cli_accepts_negative_length_for_later_validation() {
        let cli = SampleCorpusCli::try_parse_from([
            "sample_corpus",
            "--path",
            "corpus/*.txt",
            "--pad-token",
            "0",
            "--length",
            "-1",
        ])
        .unwrap();
        assert_eq!(cli.length, -1);
        assert!(matches!(
            WindowLength::try_from(cli.length),
            Err(SamplerError::InvalidLength(-1))
        ));
    }

    #[test]
    fn sample_cli_pad_token_is_optional() {
        let cli = SampleCorpusCli::try_parse_from(["sample_corpus", "--path", "corpus"]).unwrap();
        assert_eq!(cli.pad_token, None);
        assert!(SampleCorpusCli::try_parse_from(["sample_corpus"]).is_err());
    }

    #[test]
    fn explicit_pad_token_needs_no_tokenizer() {
        assert_eq!(resolve_pad_token(Some(7), None).unwrap(), 7);
        assert!(matches!(
            resolve_pad_token(None, None),
            Err(SamplerError::Configuration(_))
        ));
    }

    #[test]
    fn no_tokenizer_reports_tokenizer_errors() {
        assert!(matches!(
            NoTokenizer.encode("text"),
            Err(SamplerError::Tokenizer(_))
        ));
        assert!(matches!(
            NoTokenizer.decode(&[1]),
            Err(SamplerError::Tokenizer(_))
        ));
    }
}
