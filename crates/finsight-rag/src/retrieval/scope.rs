//! Ticker allow-list

use crate::error::{Error, Result};
use crate::types::Scope;

/// Fixed set of tickers that have indexed filings
#[derive(Debug, Clone)]
pub struct AllowList {
    tickers: Vec<String>,
}

impl AllowList {
    /// Create from configured tickers (normalized to upper case)
    pub fn new<I, S>(tickers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list: Vec<String> = Vec::new();
        for ticker in tickers {
            let ticker = normalize(ticker.as_ref());
            if !ticker.is_empty() && !list.contains(&ticker) {
                list.push(ticker);
            }
        }
        Self { tickers: list }
    }

    /// Validate a raw ticker and return its scope
    pub fn resolve(&self, raw: &str) -> Result<Scope> {
        let ticker = normalize(raw);
        if self.tickers.contains(&ticker) {
            Ok(Scope::new(ticker))
        } else {
            Err(Error::UnsupportedScope {
                ticker,
                supported: self.tickers.clone(),
            })
        }
    }

    pub fn contains(&self, raw: &str) -> bool {
        self.tickers.contains(&normalize(raw))
    }

    /// Supported tickers in configured order
    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }
}

fn normalize(raw: &str) -> String {
    raw.trim().to_uppercase()
}
