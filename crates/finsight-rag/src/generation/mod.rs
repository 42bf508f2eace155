//! Prompt assembly and streamed completion decoding

pub mod prompt;
pub mod stream;

pub use prompt::{PromptBuilder, INSUFFICIENT_CONTEXT};
pub use stream::{decode_fragments, parse_ndjson_line, parse_sse_line, LineDecoder};
