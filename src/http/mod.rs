//! HTTP/1.1 protocol implementation.
//!
//! # Architecture
//!
//! The HTTP layer is organized into several submodules:
//!
//! - **`codec`**: [`HttpCodec`](codec::HttpCodec), the [`Protocol`](crate::codec::Protocol) the connection drives
//! - **`parser`**: Incremental request parser that survives arbitrary read splits
//! - **`headers`**: Case-insensitive, insertion-ordered header map
//! - **`request`**: HTTP request representation and builder
//! - **`response`**: HTTP response representation with builder pattern
//! - **`router`**: Path patterns with named captures and a method + path router
//! - **`writer`**: Serializes responses, adding `Content-Length`
//!
//! # Request lifecycle
//!
//! A connection hands every chunk it reads to the codec:
//!
//! ```text
//!   bytes ──► RequestParser ──┬── need more data → read again
//!             (request line,  ├── Request        → handler
//!              headers, body) └── ParseError     → 4xx/5xx, close
//!
//!   Response ──► writer ──► bytes (Content-Length computed)
//! ```
//!
//! Keep-alive follows the request version: HTTP/1.1 stays open unless
//! `Connection: close` is sent, HTTP/1.0 closes unless `Connection:
//! keep-alive` is sent. A response carrying `Connection: close` also
//! ends the connection once it is written.
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use spinserve::codec::{DecodeOutcome, Protocol};
//! use spinserve::http::codec::HttpCodec;
//! use spinserve::http::response::Response;
//!
//! let mut codec = HttpCodec::default();
//! let mut input = BytesMut::from(&b"GET /hello HTTP/1.1\r\nHost: x\r\n\r\n"[..]);
//!
//! let DecodeOutcome::Decoded(req) = codec.decode(&mut input).unwrap() else {
//!     panic!("expected a request");
//! };
//! assert_eq!(req.path, "/hello");
//!
//! let mut out = BytesMut::new();
//! codec.encode(Response::ok("hi"), &mut out);
//! assert_eq!(&out[..], b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi");
//! ```

pub mod codec;
pub mod headers;
pub mod parser;
pub mod request;
pub mod response;
pub mod router;
pub mod writer;
