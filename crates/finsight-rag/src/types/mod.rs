//! Core data types for the RAG service

pub mod event;
pub mod passage;
pub mod query;
pub mod response;

pub use event::StreamEvent;
pub use passage::Passage;
pub use query::{Query, Role, Scope, Turn};
pub use response::Answer;
