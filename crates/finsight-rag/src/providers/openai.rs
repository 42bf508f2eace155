//! OpenAI providers for embeddings and chat completions

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::OpenAiConfig;
use crate::error::{Error, Result, Upstream};
use crate::generation::stream::{decode_fragments, parse_sse_line};

use super::embedding::{check_dimensions, Embedder};
use super::llm::{ChatMessage, FragmentStream, Generator};
use super::{ensure_success, http_client, transport_error};

/// Shared HTTP handle for the OpenAI API
pub struct OpenAiClient {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    /// Create a new client; fails if no API key is configured
    pub fn new(config: &OpenAiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::ConfigurationMissing(
                "OpenAI API key not configured".to_string(),
            ));
        }
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            config: config.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.url(path))
            .bearer_auth(&self.config.api_key)
    }

    /// Check that the API accepts the key
    pub async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(self.url("/v1/models"))
            .bearer_auth(&self.config.api_key)
            .send()
            .await;
        match response {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI embedding provider
pub struct OpenAiEmbedder {
    client: Arc<OpenAiClient>,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    pub fn new(config: &OpenAiConfig) -> Result<Self> {
        Ok(Self::from_client(Arc::new(OpenAiClient::new(config)?)))
    }

    /// Create from an existing client
    pub fn from_client(client: Arc<OpenAiClient>) -> Self {
        Self {
            model: client.config.embedding_model.clone(),
            dimensions: client.config.embedding_dimensions,
            client,
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::invalid_input("Cannot embed empty text"));
        }

        let response = self
            .client
            .post("/v1/embeddings")
            .json(&EmbedRequest {
                model: &self.model,
                input: text,
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

        let embedding = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Error::upstream(Upstream::Embedding, "No embedding in response"))?;

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
        "openai"
    }
}

/// OpenAI chat completion provider
pub struct OpenAiGenerator {
    client: Arc<OpenAiClient>,
    model: String,
    temperature: f32,
}

impl OpenAiGenerator {
    pub fn new(config: &OpenAiConfig) -> Result<Self> {
        Ok(Self::from_client(Arc::new(OpenAiClient::new(config)?)))
    }

    /// Create from an existing client
    pub fn from_client(client: Arc<OpenAiClient>) -> Self {
        Self {
            model: client.config.chat_model.clone(),
            temperature: client.config.temperature,
            client,
        }
    }

    async fn send(&self, messages: &[ChatMessage], stream: bool) -> Result<reqwest::Response> {
        let response = self
            .client
            .post("/v1/chat/completions")
            .json(&ChatRequest {
                model: &self.model,
                messages,
                temperature: self.temperature,
                stream,
            })
            .send()
            .await
            .map_err(|e| transport_error(Upstream::Generation, e))?;
        ensure_success(Upstream::Generation, response).await
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        tracing::debug!(model = %self.model, messages = messages.len(), "chat completion");

        let response = self.send(messages, false).await?;
        let body: ChatResponse = response.json().await.map_err(|e| {
            Error::upstream(
                Upstream::Generation,
                format!("Failed to parse chat response: {}", e),
            )
        })?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| Error::upstream(Upstream::Generation, "No choices in chat response"))
    }

    async fn complete_stream(&self, messages: &[ChatMessage]) -> Result<FragmentStream> {
        tracing::debug!(model = %self.model, messages = messages.len(), "streaming chat completion");

        let response = self.send(messages, true).await?;
        Ok(decode_fragments(response.bytes_stream(), parse_sse_line))
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
