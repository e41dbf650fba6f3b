use async_trait::async_trait;

use crate::core::errors::RagError;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider name for logs (e.g. "gemini", "hashing").
    fn name(&self) -> &str;

    /// Dimensionality every returned vector is expected to have, if fixed.
    fn dimensions(&self) -> Option<usize>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;
}
