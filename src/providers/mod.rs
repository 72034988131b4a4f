pub mod openai;
pub mod openai_compatible;
pub mod traits;
pub mod utils;

pub use openai::openai::{OpenAIEmbeddings, OpenAIProvider};
pub use openai_compatible::openai_compatible::OpenAICompatibleProvider;
pub use traits::{CompletionProvider, EmbeddingProvider};
pub use utils::HashEmbeddings;
