//! Feature-hashing embedder.
//!
//! Each lowercase word is hashed into one of `dimensions` buckets and the bucket counts are
//! L2-normalized. Texts sharing words end up close under cosine distance, which is enough to
//! exercise the pipeline without a remote model.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::provider::EmbeddingProvider;
use crate::core::errors::RagError;

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Result<Self, RagError> {
        if dimensions == 0 {
            return Err(RagError::Config(
                "hashing embedder needs at least one dimension".to_string(),
            ));
        }
        Ok(Self { dimensions })
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokenize(text) {
            vector[self.bucket(&token)] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }

    fn bucket(&self, token: &str) -> usize {
        let digest = Sha256::digest(token.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        (u64::from_be_bytes(prefix) % self.dimensions as u64) as usize
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    fn dimensions(&self) -> Option<usize> {
        Some(self.dimensions)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        Ok(self.embed_sync(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn same_text_same_vector() {
        let embedder = HashingEmbedder::new(32).unwrap();
        assert_eq!(embedder.embed_sync("Hello, World"), embedder.embed_sync("hello world"));
    }

    #[test]
    fn vectors_are_unit_length() {
        let embedder = HashingEmbedder::new(16).unwrap();
        let vector = embedder.embed_sync("Paris is in France");
        assert_eq!(vector.len(), 16);
        assert!((dot(&vector, &vector) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(8).unwrap();
        assert!(embedder.embed_sync("  ...  ").iter().all(|v| *v == 0.0));
    }

    #[test]
    fn shared_words_score_higher() {
        let embedder = HashingEmbedder::new(256).unwrap();
        let query = embedder.embed_sync("Where is Paris?");
        let related = embedder.embed_sync("Paris is in France");
        let unrelated = embedder.embed_sync("LangChain helps orchestrate LLMs and tools together.");
        assert!(dot(&query, &related) > dot(&query, &unrelated));
    }

    #[test]
    fn zero_dimensions_rejected() {
        assert!(HashingEmbedder::new(0).is_err());
    }
}
