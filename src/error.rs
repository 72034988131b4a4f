use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QaError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Embedding provider error: {0}")]
    EmbeddingProvider(String),
    #[error("Language model error: {0}")]
    LanguageModel(String),
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, QaError>;
