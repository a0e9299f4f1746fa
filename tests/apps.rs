use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::path::Path;

use chunk_corpus::apps::{run_interact, run_sample_corpus};
use chunk_corpus::{
    GenerationConfig, HParams, SamplerError, SamplingParams, TextEncoder, TextGenerator, TokenId,
};
use safetensors::tensor::{Dtype, TensorView};
use tempfile::tempdir;

/// Maps bytes to ids one-to-one.
struct ByteEncoder;

impl TextEncoder for ByteEncoder {
    fn encode(&self, text: &str) -> Result<Vec<TokenId>, SamplerError> {
        Ok(text.bytes().map(TokenId::from).collect())
    }

    fn decode(&self, tokens: &[TokenId]) -> Result<String, SamplerError> {
        let bytes: Vec<u8> = tokens.iter().map(|&id| id as u8).collect();
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Appends an uppercased copy of the context, then the stop marker.
struct ShoutingGenerator;

impl TextGenerator for ShoutingGenerator {
    fn generate(
        &mut self,
        contexts: &[Vec<TokenId>],
        _length: usize,
        _params: &SamplingParams,
    ) -> Result<Vec<Vec<TokenId>>, SamplerError> {
        Ok(contexts
            .iter()
            .map(|context| {
                let mut row = context.clone();
                let shout: Vec<TokenId> = context
                    .iter()
                    .filter(|&&id| id != TokenId::from(b'\n'))
                    .map(|&id| TokenId::from((id as u8).to_ascii_uppercase()))
                    .collect();
                row.extend(shout);
                row.extend("<|endoftext|>".bytes().map(TokenId::from));
                row
            })
            .collect())
    }
}

fn write_model_dir(models_dir: &Path, n_ctx: usize) {
    let model_dir = models_dir.join("117M");
    fs::create_dir_all(&model_dir).unwrap();
    fs::write(
        model_dir.join("hparams.json"),
        format!(r#"{{"n_vocab": 256, "n_ctx": {n_ctx}, "n_embd": 8, "n_head": 2, "n_layer": 1}}"#),
    )
    .unwrap();
}

fn args(values: &[&str]) -> impl Iterator<Item = String> {
    values
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .into_iter()
}

type Runtime = Result<(ByteEncoder, ShoutingGenerator), Box<dyn Error>>;

fn runtime(_config: &GenerationConfig, _hparams: &HParams) -> Runtime {
    Ok((ByteEncoder, ShoutingGenerator))
}

#[test]
fn interact_writes_predictions_next_to_input() {
    let dir = tempdir().unwrap();
    let models_dir = dir.path().join("models");
    write_model_dir(&models_dir, 64);
    let input = dir.path().join("X_test").join("recipes_X_test.txt");
    fs::create_dir_all(input.parent().unwrap()).unwrap();
    fs::write(&input, "soup\n\nbread\n\n").unwrap();

    let mut resolved = None;
    run_interact(
        args(&[
            "--models-dir",
            models_dir.to_str().unwrap(),
            "--filename",
            input.to_str().unwrap(),
            "--top-k",
            "40",
        ]),
        |config: &GenerationConfig, hparams: &HParams| {
            resolved = Some((config.clone(), hparams.clone()));
            runtime(config, hparams)
        },
    )
    .unwrap();

    let output = dir.path().join("y_pred").join("recipes_y_pred.txt");
    assert_eq!(fs::read_to_string(&output).unwrap(), "SOUP\nBREAD\n");

    let (config, hparams) = resolved.unwrap();
    assert_eq!(hparams.n_ctx, 64);
    assert_eq!(config.sampling.top_k, 40);
    assert_eq!(config.validate(&hparams).unwrap(), 32);
}

#[test]
fn interact_does_not_clobber_without_overwrite() {
    let dir = tempdir().unwrap();
    let models_dir = dir.path().join("models");
    write_model_dir(&models_dir, 64);
    let input = dir.path().join("X_test.txt");
    fs::write(&input, "soup\n").unwrap();
    let output = dir.path().join("y_pred.txt");
    fs::write(&output, "keep me").unwrap();

    let base = [
        "--models-dir",
        models_dir.to_str().unwrap(),
        "--filename",
        input.to_str().unwrap(),
    ];
    run_interact(args(&base), runtime).unwrap();
    assert_eq!(fs::read_to_string(&output).unwrap(), "keep me");

    let mut with_overwrite = base.to_vec();
    with_overwrite.push("--overwrite");
    run_interact(args(&with_overwrite), runtime).unwrap();
    assert_eq!(fs::read_to_string(&output).unwrap(), "SOUP");
}

#[test]
fn interact_rejects_length_beyond_context_window() {
    let dir = tempdir().unwrap();
    let models_dir = dir.path().join("models");
    write_model_dir(&models_dir, 16);
    let input = dir.path().join("X_test.txt");
    fs::write(&input, "soup\n").unwrap();

    let mut built = false;
    let result = run_interact(
        args(&[
            "--models-dir",
            models_dir.to_str().unwrap(),
            "--filename",
            input.to_str().unwrap(),
            "--length",
            "17",
        ]),
        |config: &GenerationConfig, hparams: &HParams| {
            built = true;
            runtime(config, hparams)
        },
    );
    assert!(result.is_err());
    assert!(!built);
    assert!(!dir.path().join("y_pred.txt").exists());
}

#[test]
fn interact_reports_missing_model_directory() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("X_test.txt");
    fs::write(&input, "soup\n").unwrap();
    let result = run_interact(
        args(&[
            "--models-dir",
            dir.path().join("absent").to_str().unwrap(),
            "--filename",
            input.to_str().unwrap(),
        ]),
        runtime,
    );
    assert!(result.is_err());
}

#[test]
fn sample_corpus_runs_over_pretokenized_bundle() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tokens.safetensors");
    let arrays: Vec<(String, Vec<u8>)> = [vec![1u32, 2, 3], vec![4, 5]]
        .iter()
        .enumerate()
        .map(|(idx, ids)| {
            (
                format!("arr_{idx}"),
                ids.iter().flat_map(|id| id.to_le_bytes()).collect(),
            )
        })
        .collect();
    let views: Vec<(&str, TensorView<'_>)> = arrays
        .iter()
        .map(|(name, bytes)| {
            (
                name.as_str(),
                TensorView::new(Dtype::U32, vec![bytes.len() / 4], bytes).unwrap(),
            )
        })
        .collect();
    fs::write(
        &path,
        safetensors::serialize(views, None::<HashMap<String, String>>).unwrap(),
    )
    .unwrap();

    run_sample_corpus(args(&[
        "--path",
        path.to_str().unwrap(),
        "--pad-token",
        "0",
        "--length",
        "4",
        "--seed",
        "42",
    ]))
    .unwrap();
}

#[test]
fn sample_corpus_rejects_negative_length_and_empty_corpus() {
    let dir = tempdir().unwrap();
    let negative = run_sample_corpus(args(&[
        "--path",
        dir.path().to_str().unwrap(),
        "--pad-token",
        "0",
        "--length",
        "-1",
    ]));
    let err = negative.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SamplerError>(),
        Some(SamplerError::InvalidLength(-1))
    ));

    let empty = run_sample_corpus(args(&[
        "--path",
        dir.path().to_str().unwrap(),
        "--pad-token",
        "0",
    ]));
    let err = empty.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SamplerError>(),
        Some(SamplerError::InvalidCorpus)
    ));
}

#[test]
fn sample_corpus_needs_tokenizer_for_text_files() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("doc.txt"), "hello").unwrap();
    let result = run_sample_corpus(args(&[
        "--path",
        dir.path().to_str().unwrap(),
        "--pad-token",
        "0",
    ]));
    let err = result.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SamplerError>(),
        Some(SamplerError::Tokenizer(_))
    ));
}

#[test]
fn sample_corpus_needs_pad_token_without_tokenizer() {
    let dir = tempdir().unwrap();
    let result = run_sample_corpus(args(&["--path", dir.path().to_str().unwrap()]));
    let err = result.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SamplerError>(),
        Some(SamplerError::Configuration(_))
    ));
}

const WORD_LEVEL_TOKENIZER: &str = r#"{
    "version": "1.0",
    "truncation": null,
    "padding": null,
    "added_tokens": [
        {
            "id": 2,
            "content": "<|endoftext|>",
            "single_word": false,
            "lstrip": false,
            "rstrip": false,
            "normalized": false,
            "special": true
        }
    ],
    "normalizer": null,
    "pre_tokenizer": { "type": "Whitespace" },
    "post_processor": null,
    "decoder": null,
    "model": {
        "type": "WordLevel",
        "vocab": { "hello": 0, "[UNK]": 1, "<|endoftext|>": 2 },
        "unk_token": "[UNK]"
    }
}"#;

#[test]
fn sample_corpus_pads_with_tokenizer_end_of_text_by_default() {
    let dir = tempdir().unwrap();
    let corpus_dir = dir.path().join("corpus");
    fs::create_dir_all(&corpus_dir).unwrap();
    fs::write(corpus_dir.join("doc.txt"), "hello hello").unwrap();
    let tokenizer = dir.path().join("tokenizer.json");
    fs::write(&tokenizer, WORD_LEVEL_TOKENIZER).unwrap();

    run_sample_corpus(args(&[
        "--path",
        corpus_dir.to_str().unwrap(),
        "--tokenizer",
        tokenizer.to_str().unwrap(),
        "--length",
        "8",
        "--seed",
        "1",
    ]))
    .unwrap();
}
