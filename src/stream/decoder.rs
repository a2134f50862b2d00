//! Incremental UTF-8 decoding
//!
//! Chunk boundaries of an HTTP body can land inside a multi-byte character.
//! The decoder holds back an incomplete trailing sequence until the bytes that
//! complete it arrive.

/// Stateful byte-to-text decoder for one stream.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    /// Incomplete trailing sequence from the previous chunk (at most 3 bytes)
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a chunk, returning all text that can be completed so far.
    ///
    /// Invalid sequences are replaced with U+FFFD instead of failing the stream.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(bytes);

        let mut out = String::with_capacity(input.len());
        let mut rest: &[u8] = &input;

        loop {
            match std::str::from_utf8(rest) {
                Ok(s) => {
                    out.push_str(s);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));

                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            // Truncated sequence at the end: wait for more bytes
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush at end of stream. A dangling incomplete sequence becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }

    /// Number of bytes held back waiting for continuation
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ascii_passthrough() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"data: {}\n"), "data: {}\n");
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        // "é" = C3 A9, "€" = E2 82 AC
        let bytes = "é€".as_bytes();
        let mut decoder = Utf8Decoder::new();

        assert_eq!(decoder.decode(&bytes[..1]), "");
        assert_eq!(decoder.pending_len(), 1);
        assert_eq!(decoder.decode(&bytes[1..3]), "é");
        assert_eq!(decoder.pending_len(), 1);
        assert_eq!(decoder.decode(&bytes[3..]), "€");
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_every_split_point_reassembles() {
        let text = "héllo wörld 🎉 done";
        let bytes = text.as_bytes();
        for split in 0..=bytes.len() {
            let mut decoder = Utf8Decoder::new();
            let mut out = decoder.decode(&bytes[..split]);
            out.push_str(&decoder.decode(&bytes[split..]));
            out.push_str(&decoder.finish());
            assert_eq!(out, text, "split at byte {split}");
        }
    }

    #[test]
    fn test_invalid_bytes_replaced() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"a\xFFb"), "a\u{FFFD}b");
    }

    #[test]
    fn test_finish_flushes_dangling_sequence() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&[b'x', 0xE2, 0x82]), "x");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.finish(), "");
    }
}
