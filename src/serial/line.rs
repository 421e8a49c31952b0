//! Line framing and decoding for device output

use std::borrow::Cow;
use std::io::{self, BufRead, BufReader, ErrorKind, Read};

/// Splits a byte stream into newline-terminated lines.
///
/// A read timeout is not an error: whatever arrived before it is returned as
/// a partial line, and nothing at all is reported as `Ok(None)`.
pub struct LineReader<R: Read> {
    reader: BufReader<R>,
    pending: Vec<u8>,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            pending: Vec::new(),
        }
    }

    /// Read one line including its `\n`, or the bytes received before the timeout
    pub fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        match self.reader.read_until(b'\n', &mut self.pending) {
            Ok(0) if self.pending.is_empty() => Err(io::Error::new(
                ErrorKind::UnexpectedEof,
                "device reported readiness but returned no data",
            )),
            Ok(_) => Ok(Some(std::mem::take(&mut self.pending))),
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                if self.pending.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(std::mem::take(&mut self.pending)))
                }
            }
            Err(e) => Err(e),
        }
    }
}

/// Decode device bytes, replacing invalid UTF-8 with U+FFFD
pub fn decode_line(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}
