//! Append-only `(content, embedding)` storage with nearest-neighbor lookup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::RagError;

/// A stored document returned by a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentHit {
    pub content: String,
    /// Cosine distance to the query vector (lower = closer).
    pub distance: f64,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Append one document row.
    async fn insert(&self, content: &str, embedding: &[f32]) -> Result<(), RagError>;

    /// Return at most `k` documents ordered by ascending cosine distance.
    async fn query_similar(&self, embedding: &[f32], k: usize)
        -> Result<Vec<DocumentHit>, RagError>;

    /// Total number of stored documents.
    async fn count(&self) -> Result<usize, RagError>;
}

/// `k` as a SQL `LIMIT` value.
pub(crate) fn sql_limit(k: usize) -> Result<i64, RagError> {
    i64::try_from(k)
        .map_err(|_| RagError::Tool(format!("k = {} exceeds the largest supported limit", k)))
}
