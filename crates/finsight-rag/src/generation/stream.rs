//! Decoding of streamed chat completions
//!
//! Both upstream formats are line oriented: OpenAI sends server-sent events
//! (`data: {json}` with a final `data: [DONE]`), Ollama sends one JSON object
//! per line ending with `"done": true`. Network chunks do not respect line or
//! UTF-8 boundaries, so raw bytes are buffered until a full line is available.

use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;
use std::fmt::Display;

use crate::error::{Error, Result, Upstream};
use crate::providers::llm::FragmentStream;

/// Longest partial line held while waiting for a newline
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Splits a byte stream into complete text lines
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completes
    ///
    /// Fails once the unterminated remainder grows past [`MAX_LINE_BYTES`].
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            lines.push(decode_line(&line[..line.len() - 1]));
        }

        if self.buffer.len() > MAX_LINE_BYTES {
            let held = self.buffer.len();
            self.buffer.clear();
            return Err(Error::upstream(
                Upstream::Generation,
                format!(
                    "Stream line exceeds {} bytes without a newline ({} buffered)",
                    MAX_LINE_BYTES, held
                ),
            ));
        }
        Ok(lines)
    }

    /// Flush a trailing line that had no newline
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        Some(decode_line(&rest))
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// What one decoded line contributes to the answer
#[derive(Debug, Default, PartialEq)]
pub struct Frame {
    /// Text fragment, if the line carried one
    pub fragment: Option<String>,
    /// Upstream signalled end of output
    pub end: bool,
}

impl Frame {
    fn skip() -> Self {
        Self::default()
    }

    fn end() -> Self {
        Self {
            fragment: None,
            end: true,
        }
    }
}

/// Parse one server-sent-events line from an OpenAI-compatible endpoint
pub fn parse_sse_line(line: &str) -> Result<Frame> {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        // blank separators, comments, `event:` and `id:` fields
        return Ok(Frame::skip());
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return Ok(Frame::end());
    }

    let value: serde_json::Value = serde_json::from_str(data).map_err(|e| {
        Error::upstream(Upstream::Generation, format!("Malformed stream chunk: {}", e))
    })?;
    if let Some(err) = value.get("error") {
        return Err(Error::upstream(Upstream::Generation, error_message(err)));
    }

    let fragment = value["choices"][0]["delta"]["content"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    Ok(Frame {
        fragment,
        end: false,
    })
}

/// Parse one NDJSON line from Ollama's chat endpoint
pub fn parse_ndjson_line(line: &str) -> Result<Frame> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Frame::skip());
    }

    let value: serde_json::Value = serde_json::from_str(line).map_err(|e| {
        Error::upstream(Upstream::Generation, format!("Malformed stream chunk: {}", e))
    })?;
    if let Some(err) = value.get("error") {
        return Err(Error::upstream(Upstream::Generation, error_message(err)));
    }

    Ok(Frame {
        fragment: value["message"]["content"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        end: value["done"].as_bool().unwrap_or(false),
    })
}

fn error_message(err: &serde_json::Value) -> String {
    err.get("message")
        .and_then(|m| m.as_str())
        .or_else(|| err.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string())
}

struct DecodeState<S> {
    body: S,
    decoder: LineDecoder,
    pending: VecDeque<String>,
    eof: bool,
    done: bool,
}

/// Turn a streamed response body into a stream of text fragments
///
/// The stream ends cleanly only at the upstream's end marker. A transport or
/// parse failure, or a body that closes before the marker, yields one `Err`
/// and then ends.
pub fn decode_fragments<S, E>(body: S, parse: fn(&str) -> Result<Frame>) -> FragmentStream
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = DecodeState {
        body: Box::pin(body),
        decoder: LineDecoder::new(),
        pending: VecDeque::new(),
        eof: false,
        done: false,
    };

    stream::unfold(state, move |mut state| async move {
        loop {
            if state.done {
                return None;
            }

            while let Some(line) = state.pending.pop_front() {
                match parse(&line) {
                    Ok(Frame {
                        fragment: Some(text),
                        end,
                    }) => {
                        state.done = end;
                        return Some((Ok(text), state));
                    }
                    Ok(Frame {
                        fragment: None,
                        end: true,
                    }) => return None,
                    Ok(_) => continue,
                    Err(e) => {
                        state.done = true;
                        return Some((Err(e), state));
                    }
                }
            }

            if state.eof {
                // end of body without an end marker: the answer was cut off
                state.done = true;
                let err = Error::upstream(
                    Upstream::Generation,
                    "stream ended before end-of-output marker",
                );
                return Some((Err(err), state));
            }

            match state.body.next().await {
                Some(Ok(chunk)) => match state.decoder.push(&chunk) {
                    Ok(lines) => state.pending.extend(lines),
                    Err(e) => {
                        state.done = true;
                        return Some((Err(e), state));
                    }
                },
                Some(Err(e)) => {
                    state.done = true;
                    let err = Error::upstream(
                        Upstream::Generation,
                        format!("Stream interrupted: {}", e),
                    );
                    return Some((Err(err), state));
                }
                None => {
                    state.eof = true;
                    if let Some(line) = state.decoder.finish() {
                        state.pending.push_back(line);
                    }
                }
            }
        }
    })
    .boxed()
}
