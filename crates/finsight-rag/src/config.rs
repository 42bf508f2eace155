//! Configuration for the RAG service
//!
//! Values start from [`Default`], are overlaid by an optional TOML file named in
//! `FINSIGHT_CONFIG`, and finally by environment variables. The loaded value is
//! immutable and handed to the server state at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main RAG service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Backend provider (hosted or local)
    pub backend: BackendProvider,
    /// Server configuration
    pub server: ServerConfig,
    /// OpenAI configuration (hosted backend)
    pub openai: OpenAiConfig,
    /// Pinecone configuration (hosted backend)
    pub pinecone: PineconeConfig,
    /// Ollama configuration (local backend)
    pub ollama: OllamaConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
}

/// Backend provider selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendProvider {
    /// OpenAI embeddings and chat, Pinecone index
    #[default]
    Hosted,
    /// Ollama embeddings and chat, in-memory index loaded from a snapshot
    Local,
}

impl std::str::FromStr for BackendProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hosted" => Ok(Self::Hosted),
            "local" => Ok(Self::Local),
            other => Err(Error::Config(format!("Unknown backend: {}", other))),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Per-request deadline in seconds (none by default)
    pub request_timeout_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
            request_timeout_secs: None,
        }
    }
}

/// OpenAI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// API key
    pub api_key: String,
    /// API base URL
    pub base_url: String,
    /// Embedding model name
    pub embedding_model: String,
    /// Embedding dimensions (must match the index)
    pub embedding_dimensions: usize,
    /// Chat model name
    pub chat_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimensions: 1536,
            chat_model: "gpt-4o-mini".to_string(),
            temperature: 0.1, // Low for grounded, factual answers
            timeout_secs: 120,
        }
    }
}

/// Pinecone configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PineconeConfig {
    /// API key
    pub api_key: String,
    /// Index name
    pub index_name: String,
    /// Data plane host; resolved from the control plane when empty
    pub host: String,
    /// Control plane base URL
    pub control_plane_url: String,
    /// API version header value
    pub api_version: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for PineconeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            index_name: "finsight-index".to_string(),
            host: String::new(),
            control_plane_url: "https://api.pinecone.io".to_string(),
            api_version: "2024-07".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Ollama configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Embedding model name
    pub embed_model: String,
    /// Embedding dimensions
    pub embed_dimensions: usize,
    /// Chat model name
    pub chat_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// JSONL snapshot of pre-embedded passages for the in-memory index
    pub snapshot_path: PathBuf,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            embed_dimensions: 768,
            chat_model: "llama3.2:3b".to_string(),
            temperature: 0.1,
            timeout_secs: 300, // Local models can be slow on first load
            snapshot_path: PathBuf::from("data/passages.jsonl"),
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of passages to retrieve per query
    pub top_k: usize,
    /// Tickers that may be queried
    pub supported_tickers: Vec<String>,
    /// Retries for embedding and search calls (0 disables)
    pub max_retries: u32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            supported_tickers: vec!["AAPL".to_string(), "MSFT".to_string(), "GOOGL".to_string()],
            max_retries: 0,
        }
    }
}

impl RagConfig {
    /// Load configuration from defaults, optional TOML file, then environment
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var("FINSIGHT_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.normalize();
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config: RagConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!("Invalid config file {}: {}", path.display(), e))
        })?;
        config.normalize();
        Ok(config)
    }

    /// Overlay values from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("FINSIGHT_BACKEND") {
            self.backend = v.parse()?;
        }
        if let Some(v) = get("FINSIGHT_HOST") {
            self.server.host = v;
        }
        if let Some(v) = get("FINSIGHT_PORT") {
            self.server.port = parse_number("FINSIGHT_PORT", &v)?;
        }
        if let Some(v) = get("REQUEST_TIMEOUT_SECS") {
            self.server.request_timeout_secs = Some(parse_number("REQUEST_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.openai.api_key = v;
        }
        if let Some(v) = get("OPENAI_EMBEDDING_MODEL") {
            self.openai.embedding_model = v;
        }
        if let Some(v) = get("OPENAI_CHAT_MODEL") {
            self.openai.chat_model = v;
        }
        if let Some(v) = get("PINECONE_API_KEY") {
            self.pinecone.api_key = v;
        }
        if let Some(v) = get("PINECONE_INDEX_NAME") {
            self.pinecone.index_name = v;
        }
        if let Some(v) = get("PINECONE_HOST") {
            self.pinecone.host = v;
        }
        if let Some(v) = get("TOP_K_RESULTS") {
            self.retrieval.top_k = parse_number("TOP_K_RESULTS", &v)?;
        }
        if let Some(v) = get("SUPPORTED_TICKERS") {
            self.retrieval.supported_tickers = v
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = get("UPSTREAM_MAX_RETRIES") {
            self.retrieval.max_retries = parse_number("UPSTREAM_MAX_RETRIES", &v)?;
        }
        Ok(())
    }

    /// Upper-case and de-duplicate the ticker allow-list
    fn normalize(&mut self) {
        let mut tickers: Vec<String> = Vec::with_capacity(self.retrieval.supported_tickers.len());
        for ticker in &self.retrieval.supported_tickers {
            let ticker = ticker.trim().to_uppercase();
            if !ticker.is_empty() && !tickers.contains(&ticker) {
                tickers.push(ticker);
            }
        }
        self.retrieval.supported_tickers = tickers;
    }

    /// Check that the selected backend has the credentials it needs
    pub fn validate_credentials(&self) -> Result<()> {
        match self.backend {
            BackendProvider::Hosted => {
                if self.openai.api_key.trim().is_empty() {
                    return Err(Error::ConfigurationMissing(
                        "OpenAI API key not configured".to_string(),
                    ));
                }
                if self.pinecone.api_key.trim().is_empty() {
                    return Err(Error::ConfigurationMissing(
                        "Pinecone API key not configured".to_string(),
                    ));
                }
                Ok(())
            }
            BackendProvider::Local => Ok(()),
        }
    }

    /// Model used for chat completions on the selected backend
    pub fn chat_model(&self) -> &str {
        match self.backend {
            BackendProvider::Hosted => &self.openai.chat_model,
            BackendProvider::Local => &self.ollama.chat_model,
        }
    }
}

fn parse_number<T: std::str::FromStr>(var: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("Invalid number in {}: {}", var, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_match_service() {
        let config = RagConfig::default();
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.openai.embedding_model, "text-embedding-3-small");
        assert_eq!(config.openai.chat_model, "gpt-4o-mini");
        assert_eq!(config.pinecone.index_name, "finsight-index");
        assert_eq!(config.retrieval.supported_tickers, vec!["AAPL", "MSFT", "GOOGL"]);
        assert_eq!(config.backend, BackendProvider::Hosted);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RagConfig::default();
        config
            .apply_env(lookup(&[
                ("OPENAI_API_KEY", "sk-test"),
                ("TOP_K_RESULTS", "8"),
                ("SUPPORTED_TICKERS", "aapl, tsla,,AAPL"),
                ("FINSIGHT_BACKEND", "local"),
                ("PINECONE_HOST", ""),
            ]))
            .unwrap();
        config.normalize();

        assert_eq!(config.openai.api_key, "sk-test");
        assert_eq!(config.retrieval.top_k, 8);
        assert_eq!(config.retrieval.supported_tickers, vec!["AAPL", "TSLA"]);
        assert_eq!(config.backend, BackendProvider::Local);
        assert!(config.pinecone.host.is_empty());
    }

    #[test]
    fn test_invalid_number_rejected() {
        let mut config = RagConfig::default();
        let err = config
            .apply_env(lookup(&[("TOP_K_RESULTS", "five")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_missing_credentials() {
        let mut config = RagConfig::default();
        assert!(matches!(
            config.validate_credentials(),
            Err(Error::ConfigurationMissing(_))
        ));

        config.openai.api_key = "sk-test".into();
        assert!(matches!(
            config.validate_credentials(),
            Err(Error::ConfigurationMissing(msg)) if msg.contains("Pinecone")
        ));

        config.pinecone.api_key = "pc-test".into();
        assert!(config.validate_credentials().is_ok());

        let local = RagConfig {
            backend: BackendProvider::Local,
            ..RagConfig::default()
        };
        assert!(local.validate_credentials().is_ok());
    }

    #[test]
    fn test_toml_partial_file() {
        let parsed: RagConfig = toml::from_str(
            r#"
            backend = "local"

            [retrieval]
            top_k = 3
            "#,
        )
        .unwrap();
        assert_eq!(parsed.backend, BackendProvider::Local);
        assert_eq!(parsed.retrieval.top_k, 3);
        assert_eq!(parsed.retrieval.supported_tickers.len(), 3);
        assert_eq!(parsed.server.port, 8000);
    }
}
