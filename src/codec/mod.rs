//! The byte-stream / message boundary.
//!
//! A [`Protocol`] turns the bytes a connection reads into typed requests and
//! turns typed responses back into bytes. It is transport-agnostic: the
//! connection owns the buffers and the socket, the protocol only looks at
//! the bytes it is given.
//!
//! Decoding is incremental. The connection calls [`Protocol::decode`] every
//! time new bytes arrive; the protocol consumes what it can, keeps its own
//! parse state, and answers [`DecodeOutcome::NeedMoreData`] until a whole
//! request is available.

pub mod line;

use bytes::BytesMut;

pub use line::{LineCodec, LineError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome<T> {
    /// Not enough bytes yet. Parse state is kept for the next call.
    NeedMoreData,
    /// A complete request. Bytes after it stay in the buffer.
    Decoded(T),
}

/// Why a handler did not produce a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerFailure {
    /// The handler's pollable returned an error.
    Error,
    /// The handler ran past the configured deadline.
    TimedOut,
}

pub trait Protocol {
    type Request;
    type Response;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Consumes bytes from the front of `src`. An error is terminal for the
    /// connection.
    fn decode(&mut self, src: &mut BytesMut) -> Result<DecodeOutcome<Self::Request>, Self::Error>;

    /// Appends the complete wire form of `response`, framing included.
    fn encode(&mut self, response: Self::Response, dst: &mut BytesMut);

    /// Whether the connection should stay open after answering `request`.
    fn keep_alive(&self, _request: &Self::Request) -> bool {
        true
    }

    /// Whether `response` itself asks for the connection to be closed.
    fn closes_after(&self, _response: &Self::Response) -> bool {
        false
    }

    /// Best-effort response written before closing on a decode error.
    fn decode_error_response(&self, _error: &Self::Error) -> Option<Self::Response> {
        None
    }

    /// Best-effort response written before closing a connection whose peer
    /// went quiet halfway through a request.
    fn stalled_request_response(&self) -> Option<Self::Response> {
        None
    }

    /// Response sent in place of a failed handler. `None` closes the
    /// connection without answering.
    fn handler_error_response(&self, _failure: HandlerFailure) -> Option<Self::Response> {
        None
    }
}
