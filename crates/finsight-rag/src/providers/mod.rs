//! Provider abstractions for embeddings, passage search, and chat generation
//!
//! This module provides trait-based abstractions that allow switching between
//! hosted (OpenAI + Pinecone) and local (Ollama + in-memory) backends.

pub mod embedding;
pub mod llm;
pub mod local;
pub mod ollama;
pub mod openai;
pub mod passage_store;
pub mod pinecone;
pub mod retry;

pub use embedding::Embedder;
pub use llm::{ChatMessage, ChatRole, FragmentStream, Generator};
pub use local::InMemoryPassageStore;
pub use ollama::{OllamaClient, OllamaEmbedder, OllamaGenerator};
pub use openai::{OpenAiClient, OpenAiEmbedder, OpenAiGenerator};
pub use passage_store::PassageStore;
pub use pinecone::PineconeStore;
pub use retry::{RetryingEmbedder, RetryingPassageStore};

use std::time::Duration;

use crate::error::{Error, Result, Upstream};

/// Build an HTTP client with a request timeout
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .pool_max_idle_per_host(5)
        .build()
        .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Map a failed request to an upstream error
pub(crate) fn transport_error(service: Upstream, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::upstream(service, format!("Request timed out: {}", err))
    } else {
        Error::upstream(service, format!("Request failed: {}", err))
    }
}

/// Pass through successful responses, classify the rest by status
pub(crate) async fn ensure_success(
    service: Upstream,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(%service, %status, "upstream request rejected");
    Err(Error::from_status(service, status, &body))
}
