use async_trait::async_trait;
use crate::error::{QaError, Result};
use crate::providers::traits::EmbeddingProvider;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub const DEFAULT_HASH_DIMENSIONS: usize = 1536;

/// Local, deterministic bag-of-words embedder. Each lowercased token is hashed
/// into a signed bucket and the result is L2-normalised, so identical texts map
/// to identical vectors without any network access.
#[derive(Debug, Clone)]
pub struct HashEmbeddings {
    dimensions: usize,
}

impl HashEmbeddings {
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(QaError::InvalidConfiguration(
                "embedding dimensions must be greater than 0".to_string(),
            ));
        }
        Ok(Self { dimensions })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let hash = hasher.finish();
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

impl Default for HashEmbeddings {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_HASH_DIMENSIONS,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddings {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed(text))
    }
}
