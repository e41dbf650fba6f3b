//! In-process document store with brute-force cosine ranking.

use std::cmp::Ordering;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::document::{DocumentHit, DocumentStore};
use crate::core::errors::RagError;

#[derive(Default)]
pub struct InMemoryDocumentStore {
    rows: RwLock<Vec<(String, Vec<f32>)>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Cosine distance as pgvector's `<=>` computes it: `1 - cos(a, b)`.
pub(crate) fn cosine_distance(a: &[f32], b: &[f32]) -> Result<f64, RagError> {
    if a.len() != b.len() {
        return Err(RagError::Database(format!(
            "different vector dimensions {} and {}",
            a.len(),
            b.len()
        )));
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let denom = norm_a * norm_b;

    // pgvector yields NaN for zero vectors; sort those last instead
    if denom <= f64::EPSILON {
        return Ok(f64::NAN);
    }
    Ok(1.0 - dot / denom)
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(&self, content: &str, embedding: &[f32]) -> Result<(), RagError> {
        let mut rows = self.rows.write().await;
        if let Some((_, first)) = rows.first() {
            if first.len() != embedding.len() {
                return Err(RagError::Database(format!(
                    "expected {} dimensions, not {}",
                    first.len(),
                    embedding.len()
                )));
            }
        }
        rows.push((content.to_string(), embedding.to_vec()));
        Ok(())
    }

    async fn query_similar(
        &self,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<DocumentHit>, RagError> {
        let rows = self.rows.read().await;

        let mut scored = rows
            .iter()
            .map(|(content, stored)| {
                Ok(DocumentHit {
                    content: content.clone(),
                    distance: cosine_distance(embedding, stored)?,
                })
            })
            .collect::<Result<Vec<_>, RagError>>()?;

        scored.sort_by(|a, b| match (a.distance.is_nan(), b.distance.is_nan()) {
            (false, false) => a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal),
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (true, true) => Ordering::Equal,
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn count(&self) -> Result<usize, RagError> {
        Ok(self.rows.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_and_query() {
        let store = InMemoryDocumentStore::new();

        store.insert("x axis", &[1.0, 0.0, 0.0]).await.unwrap();
        store.insert("y axis", &[0.0, 1.0, 0.0]).await.unwrap();
        store.insert("mostly x", &[0.9, 0.1, 0.0]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 3);

        let hits = store.query_similar(&[1.0, 0.0, 0.0], 2).await.unwrap();
        let contents: Vec<&str> = hits.iter().map(|h| h.content.as_str()).collect();
        assert_eq!(contents, vec!["x axis", "mostly x"]);
        assert!(hits[0].distance.abs() < 1e-9);
    }

    #[tokio::test]
    async fn never_returns_more_than_k() {
        let store = InMemoryDocumentStore::new();
        for i in 0..5 {
            store
                .insert(&format!("doc {}", i), &[1.0, i as f32, 0.0])
                .await
                .unwrap();
        }

        assert_eq!(store.query_similar(&[1.0, 0.0, 0.0], 3).await.unwrap().len(), 3);
        assert_eq!(store.query_similar(&[1.0, 0.0, 0.0], 10).await.unwrap().len(), 5);
        assert!(store.query_similar(&[1.0, 0.0, 0.0], 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_store_returns_nothing() {
        let store = InMemoryDocumentStore::new();
        assert!(store.query_similar(&[1.0, 0.0, 0.0], 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dimension_mismatch_is_an_error() {
        let store = InMemoryDocumentStore::new();
        store.insert("a", &[1.0, 0.0, 0.0]).await.unwrap();

        assert!(store.insert("b", &[1.0, 0.0]).await.is_err());
        assert!(store.query_similar(&[1.0, 0.0], 1).await.is_err());
    }

    #[tokio::test]
    async fn zero_vectors_sort_last() {
        let store = InMemoryDocumentStore::new();
        store.insert("empty", &[0.0, 0.0]).await.unwrap();
        store.insert("far", &[-1.0, 0.0]).await.unwrap();

        let hits = store.query_similar(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits[0].content, "far");
        assert!(hits[1].distance.is_nan());
    }
}
