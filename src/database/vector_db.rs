use crate::document::{Document, Metadata};
use crate::error::{QaError, Result};
use crate::providers::traits::EmbeddingProvider;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub document: Document,
}

/// In-memory flat index: exact squared-L2 search over every stored vector.
#[derive(Clone)]
pub struct VectorDB {
    embeddings: Arc<dyn EmbeddingProvider>,
    entries: Vec<IndexEntry>,
    dimension: Option<usize>,
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

impl VectorDB {
    pub fn new(embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embeddings,
            entries: Vec::new(),
            dimension: None,
        }
    }

    /// Embeds `texts` and builds an index over them. `metadatas`, when given,
    /// must hold exactly one entry per text.
    pub async fn from_texts(
        texts: Vec<String>,
        embeddings: Arc<dyn EmbeddingProvider>,
        metadatas: Option<Vec<Metadata>>,
    ) -> Result<Self> {
        let mut db = Self::new(embeddings);
        db.add_texts(texts, metadatas).await?;
        Ok(db)
    }

    pub async fn from_documents(
        documents: Vec<Document>,
        embeddings: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let (texts, metadatas) = documents
            .into_iter()
            .map(|doc| (doc.page_content, doc.metadata))
            .unzip();
        Self::from_texts(texts, embeddings, Some(metadatas)).await
    }

    /// Returns the ids of the inserted entries. Nothing is inserted if
    /// embedding fails.
    pub async fn add_texts(
        &mut self,
        texts: Vec<String>,
        metadatas: Option<Vec<Metadata>>,
    ) -> Result<Vec<String>> {
        let metadatas = match metadatas {
            Some(metadatas) if metadatas.len() != texts.len() => {
                return Err(QaError::InvalidConfiguration(format!(
                    "got {} metadatas for {} texts",
                    metadatas.len(),
                    texts.len()
                )));
            }
            Some(metadatas) => metadatas,
            None => vec![Metadata::new(); texts.len()],
        };
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self.embeddings.embed_documents(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(QaError::EmbeddingProvider(format!(
                "provider returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }

        let dimension = self.dimension.unwrap_or(vectors[0].len());
        if dimension == 0 {
            return Err(QaError::EmbeddingProvider("provider returned empty vectors".to_string()));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(QaError::EmbeddingProvider(format!(
                "vector of dimension {} does not match index dimension {}",
                bad.len(),
                dimension
            )));
        }
        self.dimension = Some(dimension);

        let mut ids = Vec::with_capacity(texts.len());
        for ((text, metadata), vector) in texts.into_iter().zip(metadatas).zip(vectors) {
            let id = Uuid::new_v4().to_string();
            self.entries.push(IndexEntry {
                id: id.clone(),
                vector,
                document: Document::with_metadata(text, metadata),
            });
            ids.push(id);
        }

        log::info!("Indexed {} texts ({} total, dimension {})", ids.len(), self.entries.len(), dimension);
        Ok(ids)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        Ok(self
            .similarity_search_with_score(query, k)
            .await?
            .into_iter()
            .map(|(doc, _)| doc)
            .collect())
    }

    /// Most similar first, paired with the squared L2 distance.
    pub async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<(Document, f32)>> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }
        let vector = self.embeddings.embed_query(query).await?;
        self.similarity_search_by_vector_with_score(&vector, k)
    }

    pub fn similarity_search_by_vector(&self, vector: &[f32], k: usize) -> Result<Vec<Document>> {
        Ok(self
            .similarity_search_by_vector_with_score(vector, k)?
            .into_iter()
            .map(|(doc, _)| doc)
            .collect())
    }

    pub fn similarity_search_by_vector_with_score(
        &self,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<(Document, f32)>> {
        if let Some(dimension) = self.dimension {
            if vector.len() != dimension {
                return Err(QaError::EmbeddingProvider(format!(
                    "query vector has dimension {}, index has {}",
                    vector.len(),
                    dimension
                )));
            }
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, squared_l2(&entry.vector, vector)))
            .collect();
        // Stable: equal distances keep insertion order.
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, distance)| (self.entries[i].document.clone(), distance))
            .collect())
    }
}
