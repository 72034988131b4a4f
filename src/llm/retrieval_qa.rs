use crate::config::{QaSettings, DEFAULT_K, DEFAULT_MAX_TOKENS_LIMIT};
use crate::database::vector_db::VectorDB;
use crate::document::Document;
use crate::error::Result;
use crate::llm::qa_with_sources::{estimate_tokens, AnswerResult, ChainType, QaWithSourcesChain};
use crate::providers::traits::CompletionProvider;
use std::sync::Arc;

/// Retrieves the `k` nearest documents for a question and answers over them.
#[derive(Clone)]
pub struct VectorDbQaWithSourcesChain {
    vector_db: Arc<VectorDB>,
    combine: QaWithSourcesChain,
    k: usize,
    reduce_k_below_max_tokens: bool,
    max_tokens_limit: usize,
}

impl VectorDbQaWithSourcesChain {
    pub fn new(vector_db: Arc<VectorDB>, combine: QaWithSourcesChain) -> Self {
        Self {
            vector_db,
            combine,
            k: DEFAULT_K,
            reduce_k_below_max_tokens: false,
            max_tokens_limit: DEFAULT_MAX_TOKENS_LIMIT,
        }
    }

    pub fn from_chain_type(
        llm: Arc<dyn CompletionProvider>,
        chain_type: ChainType,
        vector_db: Arc<VectorDB>,
    ) -> Self {
        Self::new(vector_db, QaWithSourcesChain::new(llm, chain_type))
    }

    /// Applies `k`, `token_max` and the token limit settings.
    pub fn with_settings(mut self, settings: &QaSettings) -> Self {
        self.k = settings.k;
        self.reduce_k_below_max_tokens = settings.reduce_k_below_max_tokens;
        self.max_tokens_limit = settings.max_tokens_limit;
        self.combine = self.combine.with_token_max(settings.token_max);
        self
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn with_reduce_k_below_max_tokens(mut self, max_tokens_limit: usize) -> Self {
        self.reduce_k_below_max_tokens = true;
        self.max_tokens_limit = max_tokens_limit;
        self
    }

    pub async fn answer(&self, question: &str) -> Result<AnswerResult> {
        let documents = self.vector_db.similarity_search(question, self.k).await?;
        log::debug!("Retrieved {} documents for the question", documents.len());
        let documents = self.reduce_below_limit(documents);
        self.combine.answer(&documents, question).await
    }

    /// Drops trailing (least similar) documents while the set exceeds the limit.
    fn reduce_below_limit(&self, mut documents: Vec<Document>) -> Vec<Document> {
        if !self.reduce_k_below_max_tokens || self.combine.chain_type() != ChainType::Stuff {
            return documents;
        }

        let mut total: usize = documents.iter().map(|d| estimate_tokens(&d.page_content)).sum();
        while total > self.max_tokens_limit {
            match documents.pop() {
                Some(dropped) => total -= estimate_tokens(&dropped.page_content),
                None => break,
            }
        }
        documents
    }
}
