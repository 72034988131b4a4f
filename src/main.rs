use vectordb_qa::config::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_K};
use vectordb_qa::providers::traits::{CompletionProvider, EmbeddingProvider};
use vectordb_qa::providers::{HashEmbeddings, OpenAICompatibleProvider, OpenAIEmbeddings, OpenAIProvider};
use vectordb_qa::{ProviderConfig, QaSession, QaSettings};
use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Index a text file and answer a question about it with cited sources", long_about = None)]
struct Args {
    #[arg(long, default_value = "state_of_the_union.txt")]
    file: PathBuf,

    #[arg(long, default_value = "What did the president say about Justice Breyer")]
    query: String,

    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    #[arg(long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
    chunk_overlap: usize,

    #[arg(short, long, default_value_t = DEFAULT_K)]
    k: usize,

    /// Completion provider: openai, deepseek, or any name configured through <NAME>_API_URL
    #[arg(long, default_value = "openai")]
    provider: String,

    /// Use local hash embeddings instead of the OpenAI embeddings API
    #[arg(long)]
    offline: bool,
}

fn completion_provider(name: &str) -> anyhow::Result<Arc<dyn CompletionProvider>> {
    let config = ProviderConfig::from_env(name)
        .with_context(|| format!("Failed to configure provider '{}'", name))?;
    let provider: Arc<dyn CompletionProvider> = match name {
        "openai" => Arc::new(OpenAIProvider::new(&config)?),
        _ => Arc::new(OpenAICompatibleProvider::new(&config)?),
    };
    Ok(provider)
}

fn embedding_provider(offline: bool) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    if offline {
        return Ok(Arc::new(HashEmbeddings::default()));
    }
    let config = ProviderConfig::from_env("openai").context("Failed to configure OpenAI embeddings")?;
    Ok(Arc::new(OpenAIEmbeddings::new(&config)?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let settings = QaSettings {
        chunk_size: args.chunk_size,
        chunk_overlap: args.chunk_overlap,
        k: args.k,
        ..Default::default()
    };
    settings.check()?;

    let llm = completion_provider(&args.provider)?;
    let embeddings = embedding_provider(args.offline)?;
    log::info!(
        "Using {} for completions at temperature {}",
        llm.get_model_info().await?,
        llm.temperature()
    );

    println!("📚 Indexing {}", args.file.display().to_string().bright_yellow());
    let session = QaSession::open(&args.file, settings, llm, embeddings)
        .await
        .with_context(|| format!("Failed to index {}", args.file.display()))?;
    println!("✅ Indexed {} chunks", session.vector_db().len().to_string().cyan());

    session.run_demo(&args.query).await?;
    Ok(())
}
