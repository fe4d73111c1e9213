//! Newline framing for JSON message streams.
//!
//! Each message is one JSON value followed by a single `\n`. Reads arrive
//! in arbitrary chunks, so the buffer carries any trailing partial line to
//! the next read.

use thiserror::Error;

/// Maximum accepted line length (16 MB).
///
/// A stream that exceeds this without a newline is not speaking the
/// protocol; the buffer resets so framing can resynchronize at the next
/// newline.
pub const MAX_LINE_LENGTH: usize = 16 * 1024 * 1024;

/// Framing errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// The current line exceeds [`MAX_LINE_LENGTH`].
    #[error("line too long: {0} bytes (max {MAX_LINE_LENGTH})")]
    LineTooLong(usize),
}

/// Buffer that accumulates bytes and yields complete newline-terminated
/// lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a chunk and collect every line it completes.
    ///
    /// The trailing newline is stripped from each yielded line. Bytes after
    /// the last newline stay buffered for the next push.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Vec<u8>>, FramingError> {
        self.buffer.extend_from_slice(data);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop(); // the newline itself
            lines.push(line);
        }

        if self.buffer.len() > MAX_LINE_LENGTH {
            let length = self.buffer.len();
            self.buffer.clear();
            return Err(FramingError::LineTooLong(length));
        }

        Ok(lines)
    }

    /// Bytes currently carried over (the partial line, if any).
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}
