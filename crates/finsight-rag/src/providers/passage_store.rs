//! Passage store trait for namespaced similarity search

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Passage, Scope};

/// Namespaced similarity search over indexed filing passages
///
/// Implementations:
/// - `PineconeStore`: Pinecone serverless index, one namespace per ticker
/// - `InMemoryPassageStore`: cosine search over a loaded snapshot
///
/// A search must only return passages indexed under the given namespace, at
/// most `top_k` of them, sorted by relevance descending. An empty namespace is
/// an empty result, not an error.
#[async_trait]
pub trait PassageStore: Send + Sync {
    /// Search for the passages most similar to the query vector
    async fn search(&self, query: &[f32], namespace: &Scope, top_k: usize)
        -> Result<Vec<Passage>>;

    /// Check if the store is healthy
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
