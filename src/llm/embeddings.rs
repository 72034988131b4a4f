use async_trait::async_trait;
use crate::error::Result;
use crate::providers::traits::EmbeddingProvider;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

pub const DEFAULT_QUERY_CACHE_SIZE: usize = 100;

/// Embedding front-end that remembers recent query vectors, so asking the same
/// question through several chains embeds it once.
#[derive(Clone)]
pub struct EmbeddingGenerator {
    provider: Arc<dyn EmbeddingProvider>,
    query_cache: Arc<Mutex<LruCache<String, Vec<f32>>>>,
}

impl EmbeddingGenerator {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self::with_capacity(provider, DEFAULT_QUERY_CACHE_SIZE)
    }

    pub fn with_capacity(provider: Arc<dyn EmbeddingProvider>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            provider,
            query_cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    pub fn cached_queries(&self) -> usize {
        self.query_cache.lock().len()
    }
}

#[async_trait]
impl EmbeddingProvider for EmbeddingGenerator {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        log::debug!("Embedding {} documents", texts.len());
        self.provider.embed_documents(texts).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let cached = self.query_cache.lock().get(text).cloned();
        if let Some(vector) = cached {
            log::debug!("Query embedding cache hit");
            return Ok(vector);
        }

        let vector = self.provider.embed_query(text).await?;
        self.query_cache.lock().put(text.to_string(), vector.clone());
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::CountingEmbeddings;

    #[tokio::test]
    async fn test_repeated_query_hits_cache() {
        let counting = CountingEmbeddings::new(16);
        let generator = EmbeddingGenerator::new(Arc::new(counting.clone()));

        let first = generator.embed_query("Justice Breyer").await.unwrap();
        let second = generator.embed_query("Justice Breyer").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(counting.calls(), 1);
        assert_eq!(generator.cached_queries(), 1);
    }

    #[tokio::test]
    async fn test_documents_are_not_cached() {
        let counting = CountingEmbeddings::new(16);
        let generator = EmbeddingGenerator::new(Arc::new(counting.clone()));
        let texts = vec!["a".to_string(), "b".to_string()];

        generator.embed_documents(&texts).await.unwrap();
        generator.embed_documents(&texts).await.unwrap();

        assert_eq!(counting.calls(), 2);
        assert_eq!(generator.cached_queries(), 0);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let counting = CountingEmbeddings::new(16);
        let generator = EmbeddingGenerator::with_capacity(Arc::new(counting.clone()), 2);

        counting.set_failing(true);
        assert!(generator.embed_query("q").await.is_err());
        counting.set_failing(false);
        assert!(generator.embed_query("q").await.is_ok());
        assert_eq!(counting.calls(), 2);
    }
}
