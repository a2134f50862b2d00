//! Completion Stream Library
//!
//! Streams a text completion from a remote inference API and reassembles the
//! partial-event wire format into a growing text buffer.

pub mod client;
pub mod config;
pub mod handler;
pub mod stream;

pub use client::{stream_completion, CompletionClient, CompletionRequest, StreamCompletionArgs};
pub use config::settings::ClientSettings;
pub use handler::{TextHandler, Throttled};
pub use stream::{StreamError, StreamReassembler};

/// Safely truncate a string at a char boundary, never panics.
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    // Walk backwards from max_bytes to find a valid char boundary
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
