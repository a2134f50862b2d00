//! Stream reassembly
//!
//! Drives a chunked byte source through decoding, line classification and
//! JSON parsing, accumulating completion text.
//!
//! # Partial events
//!
//! Chunk boundaries do not respect event boundaries, so a JSON payload can be
//! cut in two. When a payload fails to parse it is held as the pending
//! fragment, the rest of the chunk is skipped, and the next chunk completes
//! it:
//!
//! - a `data:` line is appended to the pending fragment before parsing;
//! - a line without a known prefix is the raw continuation of the fragment,
//!   and so is whitespace before the chunk's first line break;
//! - a `delta:` line is parsed on its own and never consults the fragment.
//!
//! Any successful parse clears the fragment. A line without a known prefix
//! while nothing is pending is a protocol error.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::collections::VecDeque;

use crate::handler::TextHandler;
use crate::stream::decoder::Utf8Decoder;
use crate::stream::line::{
    classify_line, extract_delta, is_done, split_first_line, split_lines, Delta, WireLine,
};
use crate::stream::StreamError;
use crate::truncate_str;

/// Default cap on a pending JSON fragment (1 MiB)
pub const DEFAULT_MAX_PARTIAL_BYTES: usize = 1024 * 1024;

/// Longest slice of a line or payload written to logs and errors
const PREVIEW_BYTES: usize = 256;

/// Source of raw body chunks.
///
/// `Ok(None)` signals the end of the body. The source is owned by the
/// reassembler for the duration of a call and dropped on every exit path.
#[async_trait]
pub trait ChunkSource: Send {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError>;
}

#[async_trait]
impl ChunkSource for reqwest::Response {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError> {
        Ok(self.chunk().await?)
    }
}

#[async_trait]
impl ChunkSource for VecDeque<Bytes> {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError> {
        Ok(self.pop_front())
    }
}

/// Read the next chunk, flushing `handler` whenever its deadline passes first.
async fn next_chunk_flushing<S, H>(
    source: &mut S,
    handler: &mut H,
) -> Result<Option<Bytes>, StreamError>
where
    S: ChunkSource,
    H: TextHandler + ?Sized,
{
    let mut read = source.next_chunk();
    loop {
        let Some(deadline) = handler.flush_at() else {
            return read.await;
        };
        tokio::select! {
            chunk = &mut read => return chunk,
            _ = tokio::time::sleep_until(deadline) => handler.flush().await,
        }
    }
}

/// What processing one chunk led to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkOutcome {
    /// Every line was handled
    Continue,
    /// A payload failed to parse and is waiting for the next chunk
    AwaitingContinuation,
    /// The `[DONE]` sentinel was seen
    Done,
}

/// Per-call reassembly state.
///
/// Built fresh for every streaming call and consumed by [`run`](Self::run),
/// so concurrent calls never share state.
#[derive(Debug)]
pub struct StreamReassembler {
    text: String,
    partial: Option<String>,
    decoder: Utf8Decoder,
    max_partial_bytes: usize,
}

impl Default for StreamReassembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PARTIAL_BYTES)
    }
}

impl StreamReassembler {
    pub fn new(max_partial_bytes: usize) -> Self {
        Self {
            text: String::new(),
            partial: None,
            decoder: Utf8Decoder::new(),
            max_partial_bytes,
        }
    }

    /// Accumulated text so far
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Pending JSON fragment, if a payload is waiting for continuation
    pub fn partial(&self) -> Option<&str> {
        self.partial.as_deref()
    }

    /// Consume `source` until it ends or the sentinel arrives.
    ///
    /// `handler.on_text` is awaited after every chunk that changed the text,
    /// before the next chunk is read. `handler.on_end` is awaited exactly once
    /// with the final text on normal termination. Fatal errors skip `on_end`.
    ///
    /// While a read is outstanding, a deadline from [`TextHandler::flush_at`]
    /// triggers [`TextHandler::flush`] without abandoning the read.
    pub async fn run<S, H>(mut self, mut source: S, handler: &mut H) -> Result<String, StreamError>
    where
        S: ChunkSource,
        H: TextHandler + ?Sized,
    {
        while let Some(bytes) = next_chunk_flushing(&mut source, handler).await? {
            let decoded = self.decoder.decode(&bytes);
            tracing::trace!(bytes = bytes.len(), chars = decoded.len(), "Received chunk");

            let before = self.text.len();
            match self.process_chunk(&decoded)? {
                ChunkOutcome::Continue => {
                    if self.text.len() != before {
                        handler.on_text(&self.text).await;
                    }
                }
                ChunkOutcome::AwaitingContinuation => {}
                ChunkOutcome::Done => {
                    tracing::debug!("Completion stream signalled [DONE]");
                    break;
                }
            }
        }

        Ok(self.finish(handler).await)
    }

    async fn finish<H>(mut self, handler: &mut H) -> String
    where
        H: TextHandler + ?Sized,
    {
        if !self.decoder.finish().is_empty() {
            tracing::warn!("Completion stream ended inside a multi-byte character");
        }
        if let Some(partial) = self.partial.take() {
            tracing::warn!(
                fragment = %truncate_str(&partial, PREVIEW_BYTES),
                "Dropping incomplete JSON fragment at end of stream"
            );
        }

        handler.on_end(&self.text).await;
        self.text
    }

    fn process_chunk(&mut self, decoded: &str) -> Result<ChunkOutcome, StreamError> {
        let mut rest = decoded;
        if let Some(partial) = self.partial.as_deref() {
            // Whitespace between the fragment and the next line break belongs
            // to the fragment and cannot complete it.
            let (head, tail) = split_first_line(decoded);
            if !head.is_empty() && head.trim().is_empty() {
                let joined = format!("{partial}{head}");
                self.hold_partial(joined)?;
                rest = tail;
            }
        }

        for line in split_lines(rest) {
            let (origin, payload) = match classify_line(line) {
                Some(wire) => {
                    if is_done(wire.payload()) {
                        if let Some(partial) = self.partial.take() {
                            tracing::warn!(
                                fragment = %truncate_str(&partial, PREVIEW_BYTES),
                                "Dropping incomplete JSON fragment at [DONE]"
                            );
                        }
                        return Ok(ChunkOutcome::Done);
                    }
                    let payload = match (wire, self.partial.as_deref()) {
                        (WireLine::Data(payload), Some(partial)) => format!("{partial}{payload}"),
                        _ => wire.payload().to_owned(),
                    };
                    (wire.prefix(), payload)
                }
                None => match self.partial.as_deref() {
                    Some(partial) => ("continuation", format!("{partial}{line}")),
                    None => {
                        let preview = truncate_str(line, PREVIEW_BYTES);
                        tracing::error!(line = %preview, "Unexpected line in completion stream");
                        return Err(StreamError::UnexpectedLine(preview.to_owned()));
                    }
                },
            };

            match serde_json::from_str::<Value>(&payload) {
                Ok(event) => {
                    self.partial = None;
                    self.append(&event);
                }
                Err(e) => {
                    tracing::debug!(
                        error = %e,
                        line = origin,
                        data = %truncate_str(&payload, PREVIEW_BYTES),
                        "Incomplete JSON chunk, waiting for continuation"
                    );
                    self.hold_partial(payload)?;
                    return Ok(ChunkOutcome::AwaitingContinuation);
                }
            }
        }

        Ok(ChunkOutcome::Continue)
    }

    fn hold_partial(&mut self, payload: String) -> Result<(), StreamError> {
        if payload.len() > self.max_partial_bytes {
            tracing::error!(
                size = payload.len(),
                limit = self.max_partial_bytes,
                "Incomplete JSON fragment exceeded limit"
            );
            return Err(StreamError::PartialOverflow {
                size: payload.len(),
                limit: self.max_partial_bytes,
            });
        }
        self.partial = Some(payload);
        Ok(())
    }

    fn append(&mut self, event: &Value) {
        match extract_delta(event) {
            Delta::Text(text) => self.text.push_str(&text),
            Delta::Empty => {
                tracing::warn!("Completion event has choices but no text");
            }
            Delta::Unrecognized => {
                let json = event.to_string();
                tracing::warn!(
                    json = %truncate_str(&json, PREVIEW_BYTES),
                    "Unexpected event shape in completion stream"
                );
            }
        }
    }
}
