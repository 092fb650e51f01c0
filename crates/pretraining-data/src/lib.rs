//! Pretraining data handling crate.
//!
//! Turns raw text records into fixed-length `(samples, targets)` pairs for
//! next-token prediction. Records are length-filtered, tokenized on the fly,
//! filtered by token count and framed to `sequence_length` with padding.
//!
//! Work is split over a grid of `num_processes` × `workers_per_process`
//! data-loading workers. Each worker derives a unique
//! [`ShardCoordinate`] and streams only its own partition of the corpus from
//! a [`TextSource`].

pub mod config;
pub mod corpora;
pub mod dataset;
pub mod errors;
pub mod framing;
pub mod preprocessing;
pub mod sharding;
pub mod tokenizer;

// Re-export main types
pub use config::{CorpusFormat, DataConfig, LmDatasetConfig, PipelineConfig, TokenizerConfig};
pub use corpora::{InMemoryCorpus, ShardedFileCorpus, TextSource, UnimplementedSource};
pub use dataset::{LanguageModelDataset, Samples};
pub use errors::{Error, Result};
pub use framing::{collate, frame_tokens, Sample, SampleBatch};
pub use preprocessing::{normalize_text, passes_character_filter};
pub use sharding::{split_corpus_for_shards, ShardCoordinate, WorkerTopology};
pub use tokenizer::{HfTokenizer, TextTokenizer};

/// File-backed dataset built from a [`PipelineConfig`].
pub type FileDataset = LanguageModelDataset<ShardedFileCorpus, HfTokenizer>;

impl FileDataset {
    pub fn from_pipeline(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        let corpus = ShardedFileCorpus::from_config(&config.data)?;
        let tokenizer = HfTokenizer::from_config(&config.tokenizer)?;
        LanguageModelDataset::new(config.dataset.clone(), corpus, tokenizer)
    }
}
