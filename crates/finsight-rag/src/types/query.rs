//! Query request types

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;

/// Speaker of a conversation turn
///
/// Anything other than `user` or `assistant` deserializes to [`Role::Unknown`];
/// such turns are dropped when history is formatted for the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    #[serde(other)]
    Unknown,
}

/// One prior message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Company identifier that has passed the allow-list check
///
/// Always upper case. Only [`crate::retrieval::AllowList`] hands these out.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope(String);

impl Scope {
    pub(crate) fn new(ticker: String) -> Self {
        Self(ticker)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A question about one company's filing
#[derive(Debug, Clone)]
pub struct Query {
    /// The question to answer
    pub text: String,
    /// Raw ticker as supplied by the caller (normalized during validation)
    pub ticker: String,
    /// Prior turns, oldest first. Not truncated here.
    pub history: Vec<Turn>,
    /// Abort at the next suspension point once this instant passes
    pub deadline: Option<Instant>,
}

impl Query {
    /// Create a new query with empty history and no deadline
    pub fn new(text: impl Into<String>, ticker: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ticker: ticker.into(),
            history: Vec::new(),
            deadline: None,
        }
    }

    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}
