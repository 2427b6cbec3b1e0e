//! Newline framing for agent output streams.
//!
//! Bytes arrive in arbitrary chunks. Complete lines are yielded as they are
//! found; a trailing partial line stays buffered until the next chunk
//! completes it, and is flushed as a final line at EOF. Invalid UTF-8 is
//! replaced rather than rejected so one bad byte never ends the stream.

use std::io;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

/// Maximum line length accepted: 1 MiB.
///
/// Longer lines are dropped up to their terminating newline, protecting the
/// supervisor from allocating unbounded memory for a single record.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Line decoder that never fails on content.
#[derive(Debug)]
pub struct StreamCodec {
    max_length: usize,
    /// Bytes already scanned for a newline in the current buffer.
    next_index: usize,
    /// Dropping the remainder of an oversized line.
    discarding: bool,
}

impl StreamCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_BYTES)
    }

    /// Create a codec with a custom line limit.
    #[must_use]
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
        }
    }
}

impl Default for StreamCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for StreamCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let newline = src[self.next_index..]
                .iter()
                .position(|b| *b == b'\n')
                .map(|offset| self.next_index + offset);

            match (newline, self.discarding) {
                (Some(end), true) => {
                    src.advance(end + 1);
                    self.next_index = 0;
                    self.discarding = false;
                }
                (Some(end), false) if end > self.max_length => {
                    src.advance(end + 1);
                    self.next_index = 0;
                }
                (Some(end), false) => {
                    let line = src.split_to(end + 1);
                    self.next_index = 0;
                    return Ok(Some(decode_line(&line[..end])));
                }
                (None, true) => {
                    src.clear();
                    self.next_index = 0;
                    return Ok(None);
                }
                (None, false) if src.len() > self.max_length => {
                    src.clear();
                    self.next_index = 0;
                    self.discarding = true;
                    return Ok(None);
                }
                (None, false) => {
                    self.next_index = src.len();
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if src.is_empty() || self.discarding {
            src.clear();
            self.next_index = 0;
            return Ok(None);
        }
        let rest = src.split();
        self.next_index = 0;
        Ok(Some(decode_line(&rest)))
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
