//! Incremental HTTP/1.1 request parser.
//!
//! [`RequestParser`] consumes bytes from the front of a buffer as each
//! syntactic unit completes (request line, one header line, body bytes) and
//! remembers where it is, so a request may arrive split across any number of
//! reads. When the buffer does not yet hold the next complete unit the parser
//! returns `Ok(None)` and leaves the partial bytes in place.

use bytes::BytesMut;
use thiserror::Error;

use crate::config::HttpConfig;
use crate::http::headers::HeaderMap;
use crate::http::request::{Method, Request, Version};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid request line")]
    InvalidRequestLine,
    #[error("unknown request method")]
    InvalidMethod,
    #[error("unsupported HTTP version")]
    UnsupportedVersion,
    #[error("invalid header line")]
    InvalidHeader,
    #[error("line not terminated by CRLF")]
    BareLineFeed,
    #[error("request head exceeds {0} bytes")]
    HeadersTooLarge(usize),
    #[error("more than {0} headers")]
    TooManyHeaders(usize),
    #[error("invalid Content-Length")]
    InvalidContentLength,
    #[error("transfer encodings are not supported")]
    UnsupportedTransferEncoding,
    #[error("body exceeds {0} bytes")]
    BodyTooLarge(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    RequestLine,
    Headers,
    Body { remaining: usize },
}

#[derive(Debug)]
struct Head {
    method: Method,
    path: String,
    version: Version,
    headers: HeaderMap,
    body: Vec<u8>,
}

#[derive(Debug)]
pub struct RequestParser {
    limits: HttpConfig,
    state: State,
    head: Option<Head>,
    /// Bytes of request line and headers consumed so far.
    head_bytes: usize,
    /// Prefix of the buffer already searched for a line feed.
    scanned: usize,
}

impl RequestParser {
    pub fn new(limits: HttpConfig) -> Self {
        Self {
            limits,
            state: State::RequestLine,
            head: None,
            head_bytes: 0,
            scanned: 0,
        }
    }

    /// Whether the parser holds no partial request.
    pub fn is_idle(&self) -> bool {
        self.state == State::RequestLine && self.head_bytes == 0
    }

    /// Feeds the parser with the bytes at the front of `src`.
    ///
    /// Returns `Ok(Some(request))` once a complete request has been consumed;
    /// bytes after it (a pipelined request) remain in `src`.
    pub fn parse(&mut self, src: &mut BytesMut) -> Result<Option<Request>, ParseError> {
        loop {
            match self.state {
                State::RequestLine => {
                    let Some(line) = self.next_line(src)? else {
                        return Ok(None);
                    };
                    // Stray CRLFs between pipelined requests are skipped.
                    if line.is_empty() {
                        continue;
                    }
                    self.head = Some(parse_request_line(&line)?);
                    self.state = State::Headers;
                }
                State::Headers => {
                    let Some(line) = self.next_line(src)? else {
                        return Ok(None);
                    };
                    if !line.is_empty() {
                        self.push_header(&line)?;
                        continue;
                    }
                    match self.body_length()? {
                        0 => return Ok(self.finish()),
                        remaining => self.state = State::Body { remaining },
                    }
                }
                State::Body { remaining } => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    let take = remaining.min(src.len());
                    let chunk = src.split_to(take);
                    if let Some(head) = self.head.as_mut() {
                        head.body.extend_from_slice(&chunk);
                    }
                    if take < remaining {
                        self.state = State::Body {
                            remaining: remaining - take,
                        };
                        return Ok(None);
                    }
                    return Ok(self.finish());
                }
            }
        }
    }

    /// Splits one CRLF-terminated line off `src`, without the terminator.
    fn next_line(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>, ParseError> {
        let max = self.limits.max_header_bytes;
        let Some(offset) = src[self.scanned..].iter().position(|b| *b == b'\n') else {
            self.scanned = src.len();
            if self.head_bytes + src.len() > max {
                return Err(ParseError::HeadersTooLarge(max));
            }
            return Ok(None);
        };

        let lf = self.scanned + offset;
        self.scanned = 0;
        if self.head_bytes + lf + 1 > max {
            return Err(ParseError::HeadersTooLarge(max));
        }
        if lf == 0 || src[lf - 1] != b'\r' {
            return Err(ParseError::BareLineFeed);
        }

        let mut line = src.split_to(lf + 1);
        line.truncate(lf - 1);
        self.head_bytes += lf + 1;
        Ok(Some(line))
    }

    fn push_header(&mut self, line: &[u8]) -> Result<(), ParseError> {
        let max_headers = self.limits.max_headers;
        let Some(head) = self.head.as_mut() else {
            return Err(ParseError::InvalidHeader);
        };
        if head.headers.len() >= max_headers {
            return Err(ParseError::TooManyHeaders(max_headers));
        }
        let (name, value) = parse_header_line(line)?;
        head.headers.append(name, value);
        Ok(())
    }

    fn body_length(&self) -> Result<usize, ParseError> {
        let Some(head) = self.head.as_ref() else {
            return Ok(0);
        };
        if head.headers.contains("Transfer-Encoding") {
            return Err(ParseError::UnsupportedTransferEncoding);
        }
        let Some(value) = head.headers.get("Content-Length") else {
            return Ok(0);
        };

        // Repeated headers were folded into a list; every entry must agree.
        let mut length = None;
        for part in value.split(',').map(str::trim) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ParseError::InvalidContentLength);
            }
            let n: usize = part.parse().map_err(|_| ParseError::InvalidContentLength)?;
            if length.is_some_and(|prev| prev != n) {
                return Err(ParseError::InvalidContentLength);
            }
            length = Some(n);
        }

        let length = length.unwrap_or(0);
        if length > self.limits.max_body_bytes {
            return Err(ParseError::BodyTooLarge(self.limits.max_body_bytes));
        }
        Ok(length)
    }

    fn finish(&mut self) -> Option<Request> {
        self.state = State::RequestLine;
        self.head_bytes = 0;
        self.scanned = 0;
        self.head.take().map(|head| Request {
            method: head.method,
            path: head.path,
            version: head.version,
            headers: head.headers,
            body: head.body,
        })
    }
}

fn parse_request_line(line: &[u8]) -> Result<Head, ParseError> {
    let line = std::str::from_utf8(line).map_err(|_| ParseError::InvalidRequestLine)?;
    let mut parts = line.split(' ');

    let (Some(method), Some(path), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ParseError::InvalidRequestLine);
    };
    if method.is_empty() || path.is_empty() || path.contains(char::is_whitespace) {
        return Err(ParseError::InvalidRequestLine);
    }

    let method: Method = method.parse()?;
    let version = parse_version(version)?;

    Ok(Head {
        method,
        path: path.to_string(),
        version,
        headers: HeaderMap::new(),
        body: Vec::new(),
    })
}

fn parse_version(token: &str) -> Result<Version, ParseError> {
    match token {
        "HTTP/1.1" => Ok(Version::Http11),
        "HTTP/1.0" => Ok(Version::Http10),
        _ => {
            let digits = token.strip_prefix("HTTP/").map(str::as_bytes);
            match digits {
                Some([major, b'.', minor])
                    if major.is_ascii_digit() && minor.is_ascii_digit() =>
                {
                    Err(ParseError::UnsupportedVersion)
                }
                _ => Err(ParseError::InvalidRequestLine),
            }
        }
    }
}

fn parse_header_line(line: &[u8]) -> Result<(&str, &str), ParseError> {
    let line = std::str::from_utf8(line).map_err(|_| ParseError::InvalidHeader)?;
    let (name, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;

    // Rejects obsolete line folding and whitespace before the colon.
    if name.is_empty() || !name.bytes().all(is_token_byte) {
        return Err(ParseError::InvalidHeader);
    }
    Ok((name, value.trim_matches([' ', '\t'])))
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// Parses one complete request from `buf` with default limits.
///
/// Returns the request and the number of bytes it occupied, or `Ok(None)`
/// when `buf` ends before the request does.
pub fn parse_http_request(buf: &[u8]) -> Result<Option<(Request, usize)>, ParseError> {
    let mut src = BytesMut::from(buf);
    let mut parser = RequestParser::new(HttpConfig::default());
    Ok(parser
        .parse(&mut src)?
        .map(|request| (request, buf.len() - src.len())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";

        let (parsed, consumed) = parse_http_request(req).unwrap().unwrap();

        assert_eq!(parsed.path, "/");
        assert_eq!(parsed.headers.get("Host").unwrap(), "example.com");
        assert_eq!(consumed, req.len());
    }

    #[test]
    fn keeps_state_between_calls() {
        let mut parser = RequestParser::new(HttpConfig::default());
        let mut buf = BytesMut::from(&b"GET /a HTTP/1.1\r\nHo"[..]);

        assert_eq!(parser.parse(&mut buf).unwrap(), None);
        assert!(!parser.is_idle());
        assert_eq!(&buf[..], b"Ho");

        buf.extend_from_slice(b"st: x\r\n\r\n");
        let req = parser.parse(&mut buf).unwrap().unwrap();
        assert_eq!(req.header("host"), Some("x"));
        assert!(parser.is_idle());
    }

    #[test]
    fn version_classification() {
        assert_eq!(parse_version("HTTP/2.0"), Err(ParseError::UnsupportedVersion));
        assert_eq!(parse_version("HTTP/1"), Err(ParseError::InvalidRequestLine));
        assert_eq!(parse_version("FTP/1.1"), Err(ParseError::InvalidRequestLine));
    }
}
