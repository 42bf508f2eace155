//! Error types for the RAG service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// External service a failure originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    /// Embedding model
    Embedding,
    /// Vector similarity search
    Retrieval,
    /// Chat model
    Generation,
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Upstream::Embedding => "embedding",
            Upstream::Retrieval => "retrieval",
            Upstream::Generation => "generation",
        };
        f.write_str(name)
    }
}

/// RAG service errors
#[derive(Debug, Error)]
pub enum Error {
    /// Query text was empty or otherwise unusable
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Ticker is not in the configured allow-list
    #[error("Unsupported ticker: {ticker}. Supported tickers: {supported:?}")]
    UnsupportedScope {
        ticker: String,
        supported: Vec<String>,
    },

    /// Required credentials are absent
    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    /// Upstream service could not be reached or returned garbage
    #[error("{service} service unavailable: {message}")]
    UpstreamUnavailable { service: Upstream, message: String },

    /// Upstream service throttled the request
    #[error("{service} service rate limited: {message}")]
    UpstreamRateLimited { service: Upstream, message: String },

    /// Embedding length does not match the index dimension
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Caller-supplied deadline elapsed
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// Requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an upstream unavailable error
    pub fn upstream(service: Upstream, message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            service,
            message: message.into(),
        }
    }

    /// Create a rate limited error
    pub fn rate_limited(service: Upstream, message: impl Into<String>) -> Self {
        Self::UpstreamRateLimited {
            service,
            message: message.into(),
        }
    }

    /// Classify a non-success upstream HTTP status
    pub fn from_status(service: Upstream, status: reqwest::StatusCode, body: &str) -> Self {
        let message = format!("HTTP {} - {}", status, snippet(body));
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Self::rate_limited(service, message)
        } else {
            Self::upstream(service, message)
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether a surrounding layer may retry the failed call
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::UpstreamUnavailable { .. } | Error::UpstreamRateLimited { .. }
        )
    }

    /// HTTP status and machine-readable type for this error
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            Error::InvalidInput(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_input"),
            Error::UnsupportedScope { .. } => (StatusCode::BAD_REQUEST, "unsupported_ticker"),
            Error::ConfigurationMissing(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "configuration_missing")
            }
            Error::UpstreamUnavailable { .. } => (StatusCode::BAD_GATEWAY, "upstream_unavailable"),
            Error::UpstreamRateLimited { .. } => {
                (StatusCode::TOO_MANY_REQUESTS, "upstream_rate_limited")
            }
            Error::DimensionMismatch { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "dimension_mismatch")
            }
            Error::DeadlineExceeded => (StatusCode::GATEWAY_TIMEOUT, "deadline_exceeded"),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            Error::Json(_) => (StatusCode::BAD_REQUEST, "json_error"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

/// Trim an upstream body to something that fits in a log line
fn snippet(body: &str) -> String {
    const MAX: usize = 200;
    let body = body.trim();
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}
