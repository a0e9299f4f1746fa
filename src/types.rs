/// Token identifier as produced by the tokenizer vocabulary.
/// Example: `50256` (`<|endoftext|>` in the GPT-2 vocabulary)
pub type TokenId = u32;
/// One tokenized unit of input: a text file's contents or one stored array.
/// Example: `[464, 2068, 7586, 21831, 50256]`
pub type Document = Vec<TokenId>;
/// Model checkpoint name, also the directory under the models root.
/// Examples: `117M`, `345M`
pub type ModelName = String;
