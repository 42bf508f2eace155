//! Filing metadata endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::retrieval::{FilingDetails, FilingInfo};
use crate::server::state::AppState;

#[derive(Debug, Serialize)]
pub struct FilingsResponse {
    pub filings: Vec<FilingInfo>,
}

/// GET /api/filings - List filings for every supported ticker
pub async fn list_filings(State(state): State<AppState>) -> Json<FilingsResponse> {
    let filings = state
        .allow_list()
        .tickers()
        .iter()
        .map(|ticker| FilingInfo::for_ticker(ticker))
        .collect();
    Json(FilingsResponse { filings })
}

/// GET /api/filings/:ticker - Filing details for one ticker
pub async fn get_filing(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<FilingDetails>> {
    let scope = state.allow_list().resolve(&ticker).map_err(|_| {
        Error::NotFound(format!(
            "Filing not found for ticker: {}",
            ticker.trim().to_uppercase()
        ))
    })?;
    Ok(Json(FilingDetails::for_ticker(scope.as_str())))
}
