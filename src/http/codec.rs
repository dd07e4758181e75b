use bytes::BytesMut;

use crate::codec::{DecodeOutcome, HandlerFailure, Protocol};
use crate::config::HttpConfig;
use crate::http::parser::{ParseError, RequestParser};
use crate::http::request::{Method, Request};
use crate::http::response::{Response, StatusCode};
use crate::http::writer::{encode_head, encode_response};

/// HTTP/1.1 over a byte stream.
///
/// Decodes requests incrementally (see [`RequestParser`]) and encodes
/// responses with a computed `Content-Length`. The answer to a `HEAD`
/// request is encoded without its body.
#[derive(Debug)]
pub struct HttpCodec {
    parser: RequestParser,
    limits: HttpConfig,
    /// The request being answered was `HEAD`.
    answering_head: bool,
}

impl HttpCodec {
    pub fn new(limits: HttpConfig) -> Self {
        Self {
            parser: RequestParser::new(limits.clone()),
            limits,
            answering_head: false,
        }
    }
}

impl Default for HttpCodec {
    fn default() -> Self {
        Self::new(HttpConfig::default())
    }
}

/// A codec is per-connection state; cloning yields a fresh parser with the
/// same limits.
impl Clone for HttpCodec {
    fn clone(&self) -> Self {
        Self::new(self.limits.clone())
    }
}

fn status_for(error: &ParseError) -> StatusCode {
    match error {
        ParseError::HeadersTooLarge(_) | ParseError::TooManyHeaders(_) => {
            StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE
        }
        ParseError::BodyTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        ParseError::UnsupportedVersion => StatusCode::HTTP_VERSION_NOT_SUPPORTED,
        ParseError::UnsupportedTransferEncoding => StatusCode::NOT_IMPLEMENTED,
        ParseError::InvalidRequestLine
        | ParseError::InvalidMethod
        | ParseError::InvalidHeader
        | ParseError::BareLineFeed
        | ParseError::InvalidContentLength => StatusCode::BAD_REQUEST,
    }
}

fn closing(status: StatusCode) -> Response {
    let mut resp = Response::error(status);
    resp.headers.insert("Connection", "close");
    resp
}

impl Protocol for HttpCodec {
    type Request = Request;
    type Response = Response;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<DecodeOutcome<Request>, ParseError> {
        Ok(match self.parser.parse(src)? {
            Some(request) => {
                self.answering_head = request.method == Method::HEAD;
                DecodeOutcome::Decoded(request)
            }
            None => DecodeOutcome::NeedMoreData,
        })
    }

    fn encode(&mut self, response: Response, dst: &mut BytesMut) {
        if std::mem::take(&mut self.answering_head) {
            encode_head(&response, dst);
        } else {
            encode_response(&response, dst);
        }
    }

    fn keep_alive(&self, request: &Request) -> bool {
        request.keep_alive()
    }

    fn closes_after(&self, response: &Response) -> bool {
        response.headers.has_token("Connection", "close")
    }

    fn decode_error_response(&self, error: &ParseError) -> Option<Response> {
        Some(closing(status_for(error)))
    }

    fn stalled_request_response(&self) -> Option<Response> {
        Some(closing(StatusCode::REQUEST_TIMEOUT))
    }

    fn handler_error_response(&self, failure: HandlerFailure) -> Option<Response> {
        let status = match failure {
            HandlerFailure::Error => StatusCode::INTERNAL_SERVER_ERROR,
            HandlerFailure::TimedOut => StatusCode::SERVICE_UNAVAILABLE,
        };
        Some(closing(status))
    }
}
