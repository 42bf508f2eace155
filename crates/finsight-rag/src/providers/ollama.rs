//! Ollama-based providers for embeddings and chat
//!
//! Used by the local backend. Both providers can share one HTTP client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::OllamaConfig;
use crate::error::{Error, Result, Upstream};
use crate::generation::stream::{decode_fragments, parse_ndjson_line};

use super::embedding::{check_dimensions, Embedder};
use super::llm::{ChatMessage, FragmentStream, Generator};
use super::{ensure_success, http_client, transport_error};

/// Ollama API client
pub struct OllamaClient {
    client: Client,
    config: OllamaConfig,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            config: config.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        match self.client.get(self.url("/api/tags")).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Generate an embedding
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(self.url("/api/embeddings"))
            .json(&EmbedRequest {
                model: &self.config.embed_model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| transport_error(Upstream::Embedding, e))?;
        let response = ensure_success(Upstream::Embedding, response).await?;

        let body: EmbedResponse = response.json().await.map_err(|e| {
            Error::upstream(
                Upstream::Embedding,
                format!("Failed to parse embedding response: {}", e),
            )
        })?;
        Ok(body.embedding)
    }

    async fn chat(&self, messages: &[ChatMessage], stream: bool) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.url("/api/chat"))
            .json(&ChatRequest {
                model: &self.config.chat_model,
                messages,
                stream,
                options: ChatOptions {
                    temperature: self.config.temperature,
                },
            })
            .send()
            .await
            .map_err(|e| transport_error(Upstream::Generation, e))?;
        ensure_success(Upstream::Generation, response).await
    }
}

/// Ollama embedding provider using nomic-embed-text or similar models
pub struct OllamaEmbedder {
    client: Arc<OllamaClient>,
    dimensions: usize,
}

impl OllamaEmbedder {
    /// Create from existing OllamaClient
    pub fn from_client(client: Arc<OllamaClient>) -> Self {
        Self {
            dimensions: client.config.embed_dimensions,
            client,
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::invalid_input("Cannot embed empty text"));
        }
        let embedding = self.client.embed(text).await?;
        check_dimensions(self.dimensions, &embedding)?;
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Ollama chat provider
pub struct OllamaGenerator {
    client: Arc<OllamaClient>,
}

impl OllamaGenerator {
    /// Create from existing OllamaClient
    pub fn from_client(client: Arc<OllamaClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        tracing::debug!(model = %self.model(), "Ollama chat");

        let response = self.client.chat(messages, false).await?;
        let body: ChatResponse = response.json().await.map_err(|e| {
            Error::upstream(
                Upstream::Generation,
                format!("Failed to parse chat response: {}", e),
            )
        })?;
        Ok(body.message.content)
    }

    async fn complete_stream(&self, messages: &[ChatMessage]) -> Result<FragmentStream> {
        tracing::debug!(model = %self.model(), "Ollama streaming chat");

        let response = self.client.chat(messages, true).await?;
        Ok(decode_fragments(response.bytes_stream(), parse_ndjson_line))
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.client.config.chat_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_upstream;
    use axum::{routing::post, Json, Router};
    use futures_util::TryStreamExt;
    use serde_json::{json, Value};

    async fn client(app: Router, dims: usize) -> Arc<OllamaClient> {
        let base_url = spawn_upstream(app).await;
        Arc::new(
            OllamaClient::new(&OllamaConfig {
                base_url,
                embed_dimensions: dims,
                ..OllamaConfig::default()
            })
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_embed() {
        let app = Router::new().route(
            "/api/embeddings",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["model"], "nomic-embed-text");
                Json(json!({ "embedding": [1.0, 0.0] }))
            }),
        );
        let embedder = OllamaEmbedder::from_client(client(app, 2).await);
        assert_eq!(embedder.embed("risk").await.unwrap(), vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_chat_stream_until_done() {
        let app = Router::new().route(
            "/api/chat",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["stream"], true);
                concat!(
                    "{\"message\":{\"role\":\"assistant\",\"content\":\"Net \"},\"done\":false}\n",
                    "{\"message\":{\"role\":\"assistant\",\"content\":\"income\"},\"done\":false}\n",
                    "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n",
                )
            }),
        );
        let generator = OllamaGenerator::from_client(client(app, 2).await);
        let fragments: Vec<String> = generator
            .complete_stream(&[ChatMessage::user("q")])
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(fragments, vec!["Net ", "income"]);
    }

    #[tokio::test]
    async fn test_chat_complete() {
        let app = Router::new().route(
            "/api/chat",
            post(|| async { Json(json!({ "message": { "role": "assistant", "content": "Done." }, "done": true })) }),
        );
        let generator = OllamaGenerator::from_client(client(app, 2).await);
        assert_eq!(
            generator.complete(&[ChatMessage::user("q")]).await.unwrap(),
            "Done."
        );
        assert_eq!(generator.model(), "llama3.2:3b");
    }
}
