//! Static metadata about the indexed 10-K filings

use serde::Serialize;

/// Filing sections the ingestion job labels passages with
pub const FILING_SECTIONS: &[&str] = &[
    "Business Overview",
    "Risk Factors",
    "Financial Data",
    "Management's Discussion and Analysis",
    "Market Risk Disclosures",
];

const COMPANY_NAMES: &[(&str, &str)] = &[
    ("AAPL", "Apple Inc."),
    ("MSFT", "Microsoft Corporation"),
    ("GOOGL", "Alphabet Inc."),
    ("TSLA", "Tesla, Inc."),
    ("NVDA", "NVIDIA Corporation"),
    ("AMZN", "Amazon.com, Inc."),
];

/// Display name for a ticker, falling back to the ticker itself
pub fn company_name(ticker: &str) -> &str {
    COMPANY_NAMES
        .iter()
        .find(|(t, _)| *t == ticker)
        .map(|(_, name)| *name)
        .unwrap_or(ticker)
}

/// Summary entry for the filings listing
#[derive(Debug, Clone, Serialize)]
pub struct FilingInfo {
    pub ticker: String,
    pub company_name: String,
    pub available: bool,
}

/// Detail view of one filing
#[derive(Debug, Clone, Serialize)]
pub struct FilingDetails {
    pub ticker: String,
    pub company_name: String,
    pub filing_type: &'static str,
    pub sections: Vec<&'static str>,
    pub available: bool,
}

impl FilingInfo {
    /// Assumes data has been ingested for every allow-listed ticker
    pub fn for_ticker(ticker: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            company_name: company_name(ticker).to_string(),
            available: true,
        }
    }
}

impl FilingDetails {
    pub fn for_ticker(ticker: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            company_name: company_name(ticker).to_string(),
            filing_type: "10-K",
            sections: FILING_SECTIONS.to_vec(),
            available: true,
        }
    }
}
