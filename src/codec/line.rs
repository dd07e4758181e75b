//! Newline-delimited text protocol.
//!
//! Each request is one line terminated by `\n` (a `\r` before it is
//! dropped). Each response is written as-is followed by `\n`.

use bytes::{BufMut, BytesMut};
use thiserror::Error;

use super::{DecodeOutcome, HandlerFailure, Protocol};

pub const DEFAULT_MAX_LINE: usize = 8192;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LineError {
    #[error("line exceeds {0} bytes")]
    TooLong(usize),
    #[error("line is not valid UTF-8")]
    InvalidUtf8,
}

#[derive(Debug, Clone)]
pub struct LineCodec {
    max_line: usize,
    /// Bytes already searched for a newline.
    scanned: usize,
}

impl LineCodec {
    pub fn new(max_line: usize) -> Self {
        Self {
            max_line,
            scanned: 0,
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE)
    }
}

impl Protocol for LineCodec {
    type Request = String;
    type Response = String;
    type Error = LineError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<DecodeOutcome<String>, LineError> {
        let Some(offset) = src[self.scanned..].iter().position(|b| *b == b'\n') else {
            self.scanned = src.len();
            if src.len() > self.max_line {
                return Err(LineError::TooLong(self.max_line));
            }
            return Ok(DecodeOutcome::NeedMoreData);
        };

        let end = self.scanned + offset;
        self.scanned = 0;
        if end > self.max_line {
            return Err(LineError::TooLong(self.max_line));
        }

        let mut line = src.split_to(end + 1);
        line.truncate(end);
        if line.last() == Some(&b'\r') {
            line.truncate(end - 1);
        }

        String::from_utf8(line.to_vec())
            .map(DecodeOutcome::Decoded)
            .map_err(|_| LineError::InvalidUtf8)
    }

    fn encode(&mut self, response: String, dst: &mut BytesMut) {
        dst.reserve(response.len() + 1);
        dst.put_slice(response.as_bytes());
        dst.put_u8(b'\n');
    }

    fn decode_error_response(&self, error: &LineError) -> Option<String> {
        Some(format!("ERR {error}"))
    }

    fn handler_error_response(&self, failure: HandlerFailure) -> Option<String> {
        match failure {
            HandlerFailure::Error => Some("ERR internal error".to_string()),
            HandlerFailure::TimedOut => Some("ERR timed out".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_lines_one_at_a_time() {
        let mut codec = LineCodec::default();
        let mut buf = BytesMut::from(&b"first\r\nsecond\n"[..]);

        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            DecodeOutcome::Decoded("first".to_string())
        );
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            DecodeOutcome::Decoded("second".to_string())
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), DecodeOutcome::NeedMoreData);
    }

    #[test]
    fn resumes_partial_line() {
        let mut codec = LineCodec::default();
        let mut buf = BytesMut::from(&b"hel"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), DecodeOutcome::NeedMoreData);

        buf.extend_from_slice(b"lo\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            DecodeOutcome::Decoded("hello".to_string())
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn rejects_long_lines() {
        let mut codec = LineCodec::new(4);
        let mut buf = BytesMut::from(&b"too long"[..]);
        assert_eq!(codec.decode(&mut buf), Err(LineError::TooLong(4)));
    }
}
