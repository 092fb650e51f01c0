use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

pub const DEFAULT_SEQUENCE_LENGTH: usize = 2048;

/// Options recognized by [`LanguageModelDataset`](crate::LanguageModelDataset).
///
/// `shuffle_data` is advisory: the dataset never shuffles anything itself and
/// only forwards the flag to its text source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LmDatasetConfig {
    pub sequence_length: usize,
    pub min_tokens_per_text: usize,
    pub min_characters_per_text: usize,
    pub shuffle_data: bool,
    pub random_seed: u64,
}

impl Default for LmDatasetConfig {
    fn default() -> Self {
        Self {
            sequence_length: DEFAULT_SEQUENCE_LENGTH,
            min_tokens_per_text: 0,
            min_characters_per_text: 0,
            shuffle_data: false,
            random_seed: 0,
        }
    }
}

impl LmDatasetConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sequence_length == 0 {
            return Err(Error::Validation(vec![
                "dataset.sequence_length must be greater than 0".to_string(),
            ]));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizerConfig {
    pub tokenizer_json: PathBuf,
    #[serde(default)]
    pub pad_token_id: Option<u32>,
    #[serde(default)]
    pub add_special_tokens: bool,
}

impl TokenizerConfig {
    fn apply_base_path(&mut self, base: &Path) {
        absolutize_in_place(&mut self.tokenizer_json, base);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorpusFormat {
    /// One text unit per non-blank line.
    #[default]
    Text,
    /// One JSON object per line, text read from `text_field`.
    Jsonl,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub format: CorpusFormat,
    #[serde(default = "default_text_field")]
    pub text_field: String,
}

impl DataConfig {
    fn apply_base_path(&mut self, base: &Path) {
        for file in &mut self.files {
            absolutize_in_place(file, base);
        }
    }
}

/// Everything needed to build a file-backed dataset from one config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub dataset: LmDatasetConfig,
    pub tokenizer: TokenizerConfig,
    pub data: DataConfig,
}

impl PipelineConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let mut config: PipelineConfig = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&contents)?,
            Some("toml") | Some("tml") | None => toml::from_str(&contents)?,
            Some(other) => {
                return Err(Error::invalid_config(format!(
                    "unsupported configuration extension '{}'",
                    other
                )));
            }
        };

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        config.apply_base_path(base_dir);
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.dataset.sequence_length == 0 {
            errors.push("dataset.sequence_length must be greater than 0".to_string());
        }

        if self.data.files.is_empty() {
            errors.push("data.files must not be empty".to_string());
        }

        if self.data.format == CorpusFormat::Jsonl && self.data.text_field.trim().is_empty() {
            errors.push("data.text_field must not be empty for jsonl corpora".to_string());
        }

        if self.tokenizer.tokenizer_json.as_os_str().is_empty() {
            errors.push("tokenizer.tokenizer_json must not be empty".to_string());
        }

        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }

        Ok(())
    }

    fn apply_base_path(&mut self, base: &Path) {
        self.tokenizer.apply_base_path(base);
        self.data.apply_base_path(base);
    }
}

fn absolutize_in_place(path: &mut PathBuf, base: &Path) {
    if path.as_os_str().is_empty() || path.is_absolute() {
        return;
    }
    *path = base.join(&*path);
}

fn default_text_field() -> String {
    "text".to_string()
}
