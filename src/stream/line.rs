//! Line splitting and wire-event classification
//!
//! The stream is a sequence of text lines, each `data:` or `delta:` followed by
//! a JSON object or the `[DONE]` sentinel.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Prefix of a regular completion event
pub const DATA_PREFIX: &str = "data:";
/// Prefix of a delta event
pub const DELTA_PREFIX: &str = "delta:";
/// End-of-stream sentinel
pub const DONE_SENTINEL: &str = "[DONE]";

static LINE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r\n|\r|\n").expect("line break pattern is valid"));

/// A prefixed line with the prefix stripped. The payload is left untrimmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireLine<'a> {
    Data(&'a str),
    Delta(&'a str),
}

impl<'a> WireLine<'a> {
    pub fn payload(&self) -> &'a str {
        match *self {
            WireLine::Data(p) | WireLine::Delta(p) => p,
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            WireLine::Data(_) => DATA_PREFIX,
            WireLine::Delta(_) => DELTA_PREFIX,
        }
    }
}

/// Text extracted from one parsed event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    /// Text to append
    Text(String),
    /// `choices` was present but carried no usable first `text`
    Empty,
    /// Neither `content` nor `choices`
    Unrecognized,
}

/// Split decoded text into lines, skipping blank and whitespace-only ones.
pub fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    LINE_BREAK.split(text).filter(|line| !line.trim().is_empty())
}

/// Split off the text before the first line terminator.
///
/// Returns the raw head (possibly empty or whitespace-only) and everything
/// after the terminator. Without a terminator the whole text is the head.
pub fn split_first_line(text: &str) -> (&str, &str) {
    match LINE_BREAK.find(text) {
        Some(m) => (&text[..m.start()], &text[m.end()..]),
        None => (text, ""),
    }
}

/// Classify a line by prefix. `None` means the line carries no known prefix.
pub fn classify_line(line: &str) -> Option<WireLine<'_>> {
    if let Some(payload) = line.strip_prefix(DATA_PREFIX) {
        Some(WireLine::Data(payload))
    } else {
        line.strip_prefix(DELTA_PREFIX).map(WireLine::Delta)
    }
}

/// Whether a payload is the end-of-stream sentinel
pub fn is_done(payload: &str) -> bool {
    payload.trim().starts_with(DONE_SENTINEL)
}

/// Pull the text delta out of a parsed event.
///
/// A non-empty `content` string wins; otherwise the first element of
/// `choices` supplies `text`.
pub fn extract_delta(event: &Value) -> Delta {
    if let Some(content) = event
        .get("content")
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
    {
        return Delta::Text(content.to_owned());
    }

    if let Some(choices) = event.get("choices").and_then(Value::as_array) {
        return match choices
            .first()
            .and_then(|choice| choice.get("text"))
            .and_then(Value::as_str)
        {
            Some(text) => Delta::Text(text.to_owned()),
            None => Delta::Empty,
        };
    }

    Delta::Unrecognized
}
