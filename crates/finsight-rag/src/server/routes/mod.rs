//! API routes for the FinSight server

pub mod chat;
pub mod filings;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::server::state::AppState;

/// Service name reported by the banner and health endpoints
pub const SERVICE_NAME: &str = "FinSight RAG API";

/// Build all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/info", get(info))
        // Chat
        .route("/chat", post(chat::chat_stream))
        .route("/chat/sync", post(chat::chat_sync))
        // Filings
        .route("/filings", get(filings::list_filings))
        .route("/filings/:ticker", get(filings::get_filing))
}

/// GET /api/health
async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// API info endpoint
async fn info(axum::extract::State(state): axum::extract::State<AppState>) -> Json<Value> {
    Json(json!({
        "name": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Question answering over SEC 10-K filings with cited, streamed answers",
        "backend": state.config().backend,
        "supported_tickers": state.allow_list().tickers(),
        "endpoints": {
            "GET /api/health": "Health check",
            "POST /api/chat": "Streamed answer (line-delimited JSON events)",
            "POST /api/chat/sync": "Answer in a single response",
            "GET /api/filings": "List available filings",
            "GET /api/filings/:ticker": "Filing details"
        }
    }))
}
