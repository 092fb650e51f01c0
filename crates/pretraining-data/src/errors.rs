use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serde_json error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("tokenizer error: {0}")]
    Tokenizer(#[from] tokenizers::Error),

    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid configuration: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("malformed record at {path}:{line}: {message}", path = .path.display())]
    Record {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

impl Error {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    pub(crate) fn record(
        path: impl Into<PathBuf>,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::Record {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}
