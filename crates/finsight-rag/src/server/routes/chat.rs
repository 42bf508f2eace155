//! Chat endpoints, streamed and synchronous

use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use futures_util::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{Answer, Query, Turn};

/// Request body for both chat endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// The user's question
    pub message: String,
    /// Ticker symbol, any case
    pub ticker: String,
    /// Prior turns, oldest first
    #[serde(default)]
    pub history: Vec<Turn>,
}

impl ChatRequest {
    /// Check the request and turn it into a query
    ///
    /// Runs before the pipeline is built, so a bad ticker is reported as such
    /// even when credentials are missing.
    fn into_query(self, state: &AppState) -> Result<Query> {
        if self.message.trim().is_empty() {
            return Err(Error::invalid_input("message must not be empty"));
        }
        let scope = state.allow_list().resolve(&self.ticker)?;

        let mut query = Query::new(self.message, scope.as_str()).with_history(self.history);
        if let Some(deadline) = state.request_deadline() {
            query = query.with_deadline(deadline);
        }
        Ok(query)
    }
}

/// POST /api/chat - Stream an answer as line-delimited JSON events
pub async fn chat_stream(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Response> {
    let query = request.into_query(&state)?;
    tracing::info!(ticker = %query.ticker, history = query.history.len(), "chat stream");

    let pipeline = state.pipeline().await?;
    let events = pipeline.answer_stream(query).await?;
    let body = Body::from_stream(events.map(|event| Ok::<_, Infallible>(event.to_ndjson())));

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
            (header::HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        body,
    )
        .into_response())
}

/// POST /api/chat/sync - Answer in a single response
pub async fn chat_sync(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<Answer>> {
    let query = request.into_query(&state)?;
    tracing::info!(ticker = %query.ticker, history = query.history.len(), "chat sync");

    let pipeline = state.pipeline().await?;
    let answer = pipeline.answer(query).await?;
    Ok(Json(answer))
}
