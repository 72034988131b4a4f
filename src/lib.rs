pub mod commands;
pub mod config;
pub mod database;
pub mod document;
pub mod error;
pub mod llm;
pub mod providers;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used items
pub use commands::{build_index, QaSession};
pub use config::{ProviderConfig, QaSettings};
pub use database::VectorDB;
pub use document::{CharacterTextSplitter, Document};
pub use error::{QaError, Result};
pub use llm::{AnswerResult, ChainType, QaWithSourcesChain, VectorDbQaWithSourcesChain};
