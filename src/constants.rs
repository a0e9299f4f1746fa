/// Constants used by the corpus loader.
pub mod corpus {
    /// Marker appended to raw text before tokenization so documents end explicitly.
    pub const END_OF_TEXT: &str = "<|endoftext|>";
    /// File extension reserved for pre-tokenized array bundles.
    pub const PRETOKENIZED_EXTENSION: &str = "safetensors";
}

/// Constants used by tokenizer and hparams lookup inside a model directory.
pub mod model {
    /// Default root directory holding one sub-directory per model.
    pub const DEFAULT_MODELS_DIR: &str = "models";
    /// Default model name.
    pub const DEFAULT_MODEL_NAME: &str = "117M";
    /// Hyperparameter file name inside a model directory.
    pub const HPARAMS_FILENAME: &str = "hparams.json";
    /// Tokenizer file name inside a model directory.
    pub const TOKENIZER_FILENAME: &str = "tokenizer.json";
}

/// Constants used by the conditional generation driver.
pub mod generation {
    /// Generated text is cut at the first occurrence of this character.
    pub const STOP_MARKER: char = '<';
    /// Prediction emitted for separator lines.
    pub const SEPARATOR_PREDICTION: &str = "\n";
    /// Input-path substring replaced to derive the prediction path.
    pub const INPUT_PATH_TOKEN: &str = "X_test";
    /// Replacement substring used for the prediction path.
    pub const OUTPUT_PATH_TOKEN: &str = "y_pred";
    /// Lines per input set: alternating content/separator for four fields.
    pub const LINES_PER_SET: usize = 2 * 4;
    /// Default number of sets read from an input file.
    pub const DEFAULT_SETS: usize = 100;
    /// Default number of input lines read (`DEFAULT_SETS` sets).
    pub const DEFAULT_MAX_LINES: usize = LINES_PER_SET * DEFAULT_SETS;
    /// Progress is logged once per this many sets.
    pub const PROGRESS_EVERY_SETS: usize = 10;
}
