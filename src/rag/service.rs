use std::sync::Arc;

use crate::core::errors::RagError;
use crate::embedding::EmbeddingProvider;
use crate::store::{DocumentHit, DocumentStore};

/// Separator placed between retrieved documents.
const RESULT_SEPARATOR: &str = "\n\n";

#[derive(Clone)]
pub struct RagService {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn DocumentStore>,
}

impl RagService {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn DocumentStore>) -> Self {
        Self { embedder, store }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let embedding = self.embedder.embed(text).await?;
        if embedding.is_empty() {
            return Err(RagError::Embedding(format!(
                "{} returned an empty embedding",
                self.embedder.name()
            )));
        }
        if let Some(expected) = self.embedder.dimensions() {
            if embedding.len() != expected {
                return Err(RagError::Embedding(format!(
                    "{} returned {} dimensions, expected {}",
                    self.embedder.name(),
                    embedding.len(),
                    expected
                )));
            }
        }
        Ok(embedding)
    }

    pub async fn insert_document(&self, content: &str) -> Result<(), RagError> {
        let embedding = self.embed(content).await?;
        self.store.insert(content, &embedding).await?;
        tracing::info!(chars = content.chars().count(), "Inserted document");
        Ok(())
    }

    /// Nearest `k` documents to `query`, closest first.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<DocumentHit>, RagError> {
        let embedding = self.embed(query).await?;
        let hits = self.store.query_similar(&embedding, k).await?;
        tracing::debug!(k, returned = hits.len(), "Similarity query finished");
        Ok(hits)
    }

    /// Nearest `k` documents joined with blank lines; empty when nothing is stored.
    pub async fn query_similar_documents(&self, query: &str, k: usize) -> Result<String, RagError> {
        let hits = self.search(query, k).await?;
        Ok(join_contents(&hits))
    }

    /// Inserts documents one at a time, stopping at the first failure.
    pub async fn ingest(&self, documents: &[String]) -> Result<usize, RagError> {
        for (idx, document) in documents.iter().enumerate() {
            self.insert_document(document).await.map_err(|err| {
                tracing::error!("Failed to ingest document {}: {}", idx, err);
                err
            })?;
        }
        Ok(documents.len())
    }
}

pub fn join_contents(hits: &[DocumentHit]) -> String {
    hits.iter()
        .map(|hit| hit.content.as_str())
        .collect::<Vec<_>>()
        .join(RESULT_SEPARATOR)
}
