//! Streaming completion parsing
//!
//! Turns a chunked HTTP body into accumulated completion text.

pub mod decoder;
pub mod line;
pub mod reassembler;

use thiserror::Error;

pub use decoder::Utf8Decoder;
pub use line::{
    classify_line, extract_delta, is_done, split_first_line, split_lines, Delta, WireLine,
};
pub use reassembler::{ChunkSource, StreamReassembler, DEFAULT_MAX_PARTIAL_BYTES};

/// Errors that abort a streaming completion
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("HTTP transport failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Completion API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Unexpected line in completion stream: {0}")]
    UnexpectedLine(String),

    #[error("Incomplete JSON fragment grew to {size} bytes (limit {limit})")]
    PartialOverflow { size: usize, limit: usize },

    #[error("API key is not configured")]
    MissingApiKey,
}
