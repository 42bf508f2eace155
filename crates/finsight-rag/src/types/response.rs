//! Response types for RAG queries

use serde::{Deserialize, Serialize};

use super::passage::Passage;

/// Complete answer from the synchronous path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// Generated answer text
    pub response: String,
    /// Passages the answer was grounded on, most relevant first
    pub contexts: Vec<Passage>,
    /// Normalized ticker
    pub ticker: String,
}
