use std::path::Path;

use tokenizers::Tokenizer;

use crate::config::TokenizerConfig;
use crate::errors::{Error, Result};

const PAD_TOKEN: &str = "<pad>";

/// Text to token ids, with a pad id and vocabulary size that stay fixed for
/// the lifetime of a dataset.
pub trait TextTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    fn pad_token_id(&self) -> u32;

    fn vocab_size(&self) -> usize;
}

impl<T: TextTokenizer + ?Sized> TextTokenizer for &T {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        (**self).encode(text)
    }

    fn pad_token_id(&self) -> u32 {
        (**self).pad_token_id()
    }

    fn vocab_size(&self) -> usize {
        (**self).vocab_size()
    }
}

/// Adapter over a HuggingFace `tokenizers::Tokenizer`.
pub struct HfTokenizer {
    inner: Tokenizer,
    pad_token_id: u32,
    vocab_size: usize,
    add_special_tokens: bool,
}

impl HfTokenizer {
    /// Wraps `inner`. Without an explicit `pad_token_id` the id comes from
    /// the tokenizer's padding params, then the `<pad>` token, then 0.
    pub fn new(inner: Tokenizer, pad_token_id: Option<u32>, add_special_tokens: bool) -> Self {
        let pad_token_id = pad_token_id
            .or_else(|| inner.get_padding().map(|params| params.pad_id))
            .or_else(|| inner.token_to_id(PAD_TOKEN))
            .unwrap_or(0);
        let vocab_size = inner.get_vocab_size(true);

        Self {
            inner,
            pad_token_id,
            vocab_size,
            add_special_tokens,
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let inner = Tokenizer::from_file(path.as_ref())?;
        Ok(Self::new(inner, None, false))
    }

    pub fn from_config(config: &TokenizerConfig) -> Result<Self> {
        if !config.tokenizer_json.is_file() {
            return Err(Error::invalid_config(format!(
                "tokenizer.tokenizer_json ({}) does not exist",
                config.tokenizer_json.display()
            )));
        }
        let inner = Tokenizer::from_file(&config.tokenizer_json)?;
        let tokenizer = Self::new(inner, config.pad_token_id, config.add_special_tokens);
        log::info!(
            "loaded tokenizer {} vocab_size={} pad_token_id={}",
            config.tokenizer_json.display(),
            tokenizer.vocab_size,
            tokenizer.pad_token_id
        );
        Ok(tokenizer)
    }
}

impl TextTokenizer for HfTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self.inner.encode(text, self.add_special_tokens)?;
        Ok(encoding.get_ids().to_vec())
    }

    fn pad_token_id(&self) -> u32 {
        self.pad_token_id
    }

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }
}
