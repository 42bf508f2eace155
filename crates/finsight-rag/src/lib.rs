//! finsight-rag: question answering over annual SEC 10-K filings
//!
//! A query names a company ticker and a question. The pipeline embeds the
//! question, retrieves the closest filing passages from that ticker's
//! namespace, builds a grounding prompt that demands section citations, and
//! streams the model's answer back as typed events.

pub mod config;
pub mod error;
pub mod generation;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use pipeline::{EventStream, RagPipeline, Stage};
pub use types::{Answer, Passage, Query, Role, Scope, StreamEvent, Turn};
