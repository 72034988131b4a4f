pub mod embeddings;
pub mod prompts;
pub mod qa_with_sources;
pub mod retrieval_qa;

pub use embeddings::EmbeddingGenerator;
pub use qa_with_sources::{AnswerResult, ChainType, QaWithSourcesChain};
pub use retrieval_qa::VectorDbQaWithSourcesChain;
