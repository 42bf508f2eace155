//! Embedding provider trait for query vectors

use async_trait::async_trait;

use crate::error::Result;

/// Turns query text into a fixed-length vector
///
/// Implementations:
/// - `OpenAiEmbedder`: OpenAI embeddings API (text-embedding-3-small)
/// - `OllamaEmbedder`: Local Ollama server (nomic-embed-text)
///
/// The dimension is fixed for the lifetime of the process and must match the
/// index the passage store was built with.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single non-empty text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get embedding dimensions (e.g., 1536 for text-embedding-3-small)
    fn dimensions(&self) -> usize;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Reject embeddings whose length differs from the configured dimension
pub(crate) fn check_dimensions(expected: usize, embedding: &[f32]) -> Result<()> {
    if embedding.len() != expected {
        return Err(crate::error::Error::DimensionMismatch {
            expected,
            actual: embedding.len(),
        });
    }
    Ok(())
}
