//! Generator trait for chat completions

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Lazily produced answer fragments, in generation order
pub type FragmentStream = BoxStream<'static, Result<String>>;

/// Chat message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message sent to the chat model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Trait for chat-model answer generation
///
/// Implementations:
/// - `OpenAiGenerator`: OpenAI chat completions (gpt-4o-mini)
/// - `OllamaGenerator`: Local Ollama server (llama3.2, phi3, etc.)
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate the full answer in one call
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Start a streamed answer
    ///
    /// Fails if the request itself is rejected. Failures after fragments have
    /// started flowing arrive as an `Err` item on the stream. Dropping the
    /// stream releases the upstream connection.
    async fn complete_stream(&self, messages: &[ChatMessage]) -> Result<FragmentStream>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
