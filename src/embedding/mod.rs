//! Text embedding backends.
//!
//! - `GeminiEmbedder`: remote `embedContent` calls, one text per request
//! - `HashingEmbedder`: deterministic offline embedder for demos and tests

mod gemini;
mod hashing;
mod provider;

use std::sync::Arc;

pub use gemini::GeminiEmbedder;
pub use hashing::HashingEmbedder;
pub use provider::EmbeddingProvider;

use crate::core::config::{EmbeddingProviderKind, EmbeddingSettings};
use crate::core::errors::RagError;

/// Builds the configured embedder, requesting `settings.dimensions` outputs.
pub fn build_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn EmbeddingProvider>, RagError> {
    build_embedder_with_dimensions(settings, Some(settings.dimensions))
}

/// Builds the configured embedder with an explicit output dimensionality.
///
/// `None` lets the remote model pick its native size; the hashing embedder always needs a
/// size and falls back to `settings.dimensions`.
pub fn build_embedder_with_dimensions(
    settings: &EmbeddingSettings,
    dimensions: Option<usize>,
) -> Result<Arc<dyn EmbeddingProvider>, RagError> {
    match settings.provider {
        EmbeddingProviderKind::Gemini => Ok(Arc::new(GeminiEmbedder::new(settings, dimensions)?)),
        EmbeddingProviderKind::Hashing => Ok(Arc::new(HashingEmbedder::new(
            dimensions.unwrap_or(settings.dimensions),
        )?)),
    }
}
