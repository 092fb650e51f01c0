use std::fmt;

use rand::{rngs::StdRng, SeedableRng};

use crate::config::LmDatasetConfig;
use crate::corpora::TextSource;
use crate::errors::Result;
use crate::framing::{frame_tokens, Sample};
use crate::preprocessing::passes_character_filter;
use crate::sharding::{ShardCoordinate, WorkerTopology};
use crate::tokenizer::TextTokenizer;

/// Iterable language-modeling dataset.
///
/// Raw texts come from a [`TextSource`] partitioned by shard coordinate. Each
/// text is length-filtered, tokenized on the fly (never cached, so the same
/// corpus can be studied under several tokenizers), filtered again by token
/// count and framed into a fixed-width [`Sample`]. Filtered texts are dropped
/// without a trace.
///
/// The dataset owns its random generator, seeded once from
/// `random_seed` and lent to the text source whenever an iterator is created.
pub struct LanguageModelDataset<S, T> {
    config: LmDatasetConfig,
    source: S,
    tokenizer: T,
    rng: StdRng,
}

impl<S, T> LanguageModelDataset<S, T>
where
    S: TextSource,
    T: TextTokenizer,
{
    pub fn new(config: LmDatasetConfig, source: S, tokenizer: T) -> Result<Self> {
        config.validate()?;
        let rng = StdRng::seed_from_u64(config.random_seed);

        log::info!(
            "LanguageModelDataset::new sequence_length={} min_characters_per_text={} min_tokens_per_text={} shuffle={} seed={}",
            config.sequence_length,
            config.min_characters_per_text,
            config.min_tokens_per_text,
            config.shuffle_data,
            config.random_seed
        );

        Ok(Self {
            config,
            source,
            tokenizer,
            rng,
        })
    }

    pub fn config(&self) -> &LmDatasetConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn tokenizer(&self) -> &T {
        &self.tokenizer
    }

    pub fn pad_token_id(&self) -> u32 {
        self.tokenizer.pad_token_id()
    }

    pub fn vocab_size(&self) -> usize {
        self.tokenizer.vocab_size()
    }

    pub fn seed(&self) -> u64 {
        self.config.random_seed
    }

    /// Filters, tokenizes and frames one text. `Ok(None)` means the text was
    /// too short before or after tokenization.
    pub fn tokenize_text(&self, text: &str) -> Result<Option<Sample>> {
        frame_text(&self.tokenizer, &self.config, text)
    }

    /// Samples for the corpus partition owned by `shard`.
    pub fn generate_samples(
        &mut self,
        shard: ShardCoordinate,
    ) -> Result<Samples<'_, S::Stream, T>> {
        log::info!(
            "creating sample iterator for shard {} (shuffle={})",
            shard,
            self.config.shuffle_data
        );
        let texts = self
            .source
            .stream(shard, self.config.shuffle_data, &mut self.rng)?;

        Ok(Samples {
            texts,
            tokenizer: &self.tokenizer,
            config: self.config.clone(),
        })
    }

    /// Fresh iterator for the worker described by `topology`.
    pub fn iter_with(&mut self, topology: &WorkerTopology) -> Result<Samples<'_, S::Stream, T>> {
        topology.validate()?;
        self.generate_samples(topology.shard_coordinate())
    }

    /// Fresh iterator for the worker described by the environment, see
    /// [`WorkerTopology::from_env`].
    pub fn iter(&mut self) -> Result<Samples<'_, S::Stream, T>> {
        let topology = WorkerTopology::from_env()?;
        self.iter_with(&topology)
    }
}

impl<S, T> fmt::Display for LanguageModelDataset<S, T>
where
    T: TextTokenizer,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LanguageModelDataset(\n\tvocab_size={}\n\tpad_token_id={}\n\tsequence_length={}\n\tmin_characters_per_text={}\n\tmin_tokens_per_text={}\n\tshuffle={}\n\trandom_seed={}\n)",
            self.tokenizer.vocab_size(),
            self.tokenizer.pad_token_id(),
            self.config.sequence_length,
            self.config.min_characters_per_text,
            self.config.min_tokens_per_text,
            self.config.shuffle_data,
            self.config.random_seed
        )
    }
}

/// Lazy stream of framed samples for one shard.
///
/// Source and tokenizer errors are passed through as `Err` items.
pub struct Samples<'a, I, T> {
    texts: I,
    tokenizer: &'a T,
    config: LmDatasetConfig,
}

impl<'a, I, T> Iterator for Samples<'a, I, T>
where
    I: Iterator<Item = Result<String>>,
    T: TextTokenizer,
{
    type Item = Result<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = match self.texts.next()? {
                Ok(text) => text,
                Err(err) => return Some(Err(err)),
            };

            match frame_text(self.tokenizer, &self.config, &text) {
                Ok(Some(sample)) => return Some(Ok(sample)),
                Ok(None) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

fn frame_text<T: TextTokenizer>(
    tokenizer: &T,
    config: &LmDatasetConfig,
    text: &str,
) -> Result<Option<Sample>> {
    if !passes_character_filter(text, config.min_characters_per_text) {
        return Ok(None);
    }

    let tokens = tokenizer.encode(text)?;
    if tokens.len() < config.min_tokens_per_text {
        return Ok(None);
    }

    Ok(Some(frame_tokens(
        &tokens,
        config.sequence_length,
        tokenizer.pad_token_id(),
    )))
}
