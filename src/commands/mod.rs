use crate::config::QaSettings;
use crate::database::vector_db::VectorDB;
use crate::document::{load_document, ordinal_sources, CharacterTextSplitter, Document};
use crate::error::Result;
use crate::llm::embeddings::EmbeddingGenerator;
use crate::llm::qa_with_sources::{AnswerResult, ChainType, QaWithSourcesChain};
use crate::llm::retrieval_qa::VectorDbQaWithSourcesChain;
use crate::providers::traits::{CompletionProvider, EmbeddingProvider};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Splits `text` and indexes every chunk under `{"source": <ordinal>}`.
///
/// Chunking parameters are validated before the embedding provider is touched.
pub async fn build_index(
    text: &str,
    settings: &QaSettings,
    embeddings: Arc<dyn EmbeddingProvider>,
) -> Result<VectorDB> {
    settings.check()?;
    let splitter = CharacterTextSplitter::new(settings.chunk_size, settings.chunk_overlap)?;

    let chunks = splitter.split_text(text);
    log::info!(
        "Split document into {} chunks (chunk_size={}, chunk_overlap={})",
        chunks.len(),
        settings.chunk_size,
        settings.chunk_overlap
    );

    let metadatas = ordinal_sources(chunks.len());
    VectorDB::from_texts(chunks, embeddings, Some(metadatas)).await
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// An indexed document plus the model used to answer questions about it.
pub struct QaSession {
    settings: QaSettings,
    llm: Arc<dyn CompletionProvider>,
    vector_db: Arc<VectorDB>,
}

impl QaSession {
    pub async fn open<P: AsRef<Path>>(
        path: P,
        settings: QaSettings,
        llm: Arc<dyn CompletionProvider>,
        embeddings: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let text = load_document(path).await?;
        Self::from_text(&text, settings, llm, embeddings).await
    }

    pub async fn from_text(
        text: &str,
        settings: QaSettings,
        llm: Arc<dyn CompletionProvider>,
        embeddings: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        // Every chain below embeds the same question; cache it once.
        let embeddings: Arc<dyn EmbeddingProvider> = Arc::new(EmbeddingGenerator::new(embeddings));

        let pb = spinner("Indexing document");
        let built = build_index(text, &settings, embeddings).await;
        pb.finish_and_clear();

        Ok(Self {
            settings,
            llm,
            vector_db: Arc::new(built?),
        })
    }

    pub fn vector_db(&self) -> &VectorDB {
        &self.vector_db
    }

    pub async fn search(&self, query: &str) -> Result<Vec<Document>> {
        self.vector_db.similarity_search(query, self.settings.k).await
    }

    /// Retrieves from the index, then answers with the given strategy.
    pub async fn ask(&self, chain_type: ChainType, question: &str) -> Result<AnswerResult> {
        VectorDbQaWithSourcesChain::from_chain_type(self.llm.clone(), chain_type, self.vector_db.clone())
            .with_settings(&self.settings)
            .answer(question)
            .await
    }

    /// Answers over already retrieved documents with map_reduce, keeping the
    /// per-document steps.
    pub async fn ask_over(&self, documents: &[Document], question: &str) -> Result<AnswerResult> {
        QaWithSourcesChain::new(self.llm.clone(), ChainType::MapReduce)
            .with_intermediate_steps(true)
            .with_token_max(self.settings.token_max)
            .answer(documents, question)
            .await
    }

    /// Runs retrieval, both strategies over the index, and map_reduce over the
    /// retrieved documents, printing each result.
    pub async fn run_demo(&self, question: &str) -> Result<()> {
        println!("🔍 Searching for: {}", question.bright_yellow());
        let documents = self.search(question).await?;
        print_documents(&documents);

        for chain_type in [ChainType::Stuff, ChainType::MapReduce] {
            let pb = spinner(&format!("Answering with {}", chain_type));
            let result = self.ask(chain_type, question).await;
            pb.finish_and_clear();
            print_answer(&format!("{} over the index", chain_type), &result?)?;
        }

        let pb = spinner("Answering over retrieved documents");
        let result = self.ask_over(&documents, question).await;
        pb.finish_and_clear();
        print_answer("map_reduce over retrieved documents", &result?)?;

        Ok(())
    }
}

fn print_documents(documents: &[Document]) {
    println!("\n📄 Retrieved {} documents:", documents.len().to_string().cyan());
    for document in documents {
        println!("{}", document);
    }
}

fn print_answer(label: &str, result: &AnswerResult) -> Result<()> {
    println!("\n💡 {}:", label.bright_cyan());
    println!("{}", serde_json::to_string_pretty(result)?.bright_green());
    Ok(())
}
