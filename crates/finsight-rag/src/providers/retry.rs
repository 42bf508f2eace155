//! Retry decorators for embedding and search calls
//!
//! Wrap a provider to retry retryable upstream failures with exponential
//! backoff (`2^attempt` seconds). With `max_retries = 0` the wrapped call runs
//! exactly once.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::Result;
use crate::types::{Passage, Scope};

use super::embedding::Embedder;
use super::passage_store::PassageStore;

/// Retry an operation with exponential backoff
async fn retry_request<F, Fut, T>(max_retries: u32, label: &str, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                let delay = Duration::from_secs(2u64.pow(attempt));
                tracing::warn!(
                    error = %e,
                    "{} failed (attempt {}/{}), retrying in {:?}",
                    label,
                    attempt + 1,
                    max_retries + 1,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Embedder with automatic retry
pub struct RetryingEmbedder {
    inner: Arc<dyn Embedder>,
    max_retries: u32,
}

impl RetryingEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, max_retries: u32) -> Self {
        Self { inner, max_retries }
    }
}

#[async_trait]
impl Embedder for RetryingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        retry_request(self.max_retries, "Embedding request", || self.inner.embed(text)).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn health_check(&self) -> Result<bool> {
        self.inner.health_check().await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Passage store with automatic retry
pub struct RetryingPassageStore {
    inner: Arc<dyn PassageStore>,
    max_retries: u32,
}

impl RetryingPassageStore {
    pub fn new(inner: Arc<dyn PassageStore>, max_retries: u32) -> Self {
        Self { inner, max_retries }
    }
}

#[async_trait]
impl PassageStore for RetryingPassageStore {
    async fn search(
        &self,
        query: &[f32],
        namespace: &Scope,
        top_k: usize,
    ) -> Result<Vec<Passage>> {
        retry_request(self.max_retries, "Passage search", || {
            self.inner.search(query, namespace, top_k)
        })
        .await
    }

    async fn health_check(&self) -> Result<bool> {
        self.inner.health_check().await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Upstream};
    use crate::test_support::FakeEmbedder;

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_failures() {
        let fake = Arc::new(FakeEmbedder::new(2).failing_first(2));
        let embedder = RetryingEmbedder::new(fake.clone(), 3);

        assert_eq!(embedder.embed("revenue").await.unwrap().len(), 2);
        assert_eq!(fake.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let fake = Arc::new(FakeEmbedder::new(2).failing_first(5));
        let embedder = RetryingEmbedder::new(fake.clone(), 1);

        assert!(embedder.embed("revenue").await.is_err());
        assert_eq!(fake.calls(), 2);
    }

    #[tokio::test]
    async fn test_zero_retries_runs_once() {
        let fake = Arc::new(FakeEmbedder::new(2).failing_first(1));
        let embedder = RetryingEmbedder::new(fake.clone(), 0);

        assert!(matches!(
            embedder.embed("revenue").await,
            Err(Error::UpstreamUnavailable {
                service: Upstream::Embedding,
                ..
            })
        ));
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test]
    async fn test_non_retryable_not_retried() {
        let fake = Arc::new(FakeEmbedder::new(2));
        let embedder = RetryingEmbedder::new(fake.clone(), 3);

        assert!(matches!(embedder.embed("").await, Err(Error::InvalidInput(_))));
        assert_eq!(fake.calls(), 1);
    }
}
