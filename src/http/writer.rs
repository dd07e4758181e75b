use bytes::{BufMut, BytesMut};

use crate::http::response::Response;

const HTTP_VERSION: &str = "HTTP/1.1";

/// Appends the wire form of `resp` to `dst`.
///
/// Headers are written in the order they were set. `Content-Length` is
/// added from the body unless the status never carries a body or the
/// response already frames itself with `Content-Length` or
/// `Transfer-Encoding`.
pub fn encode_response(resp: &Response, dst: &mut BytesMut) {
    encode_head(resp, dst);
    dst.put_slice(&resp.body);
}

/// Appends everything [`encode_response`] would except the body.
///
/// Used to answer `HEAD`: `Content-Length` still reports the length the
/// body would have had.
pub fn encode_head(resp: &Response, dst: &mut BytesMut) {
    let reason = if resp.reason.is_empty() {
        resp.status.canonical_reason().unwrap_or("")
    } else {
        resp.reason.as_str()
    };

    // Status line
    dst.reserve(64 + resp.body.len());
    dst.put_slice(format!("{} {} {}\r\n", HTTP_VERSION, resp.status.as_u16(), reason).as_bytes());

    // Headers
    for (k, v) in resp.headers.iter() {
        put_header(dst, k, v);
    }

    let framed = resp.headers.contains("Content-Length") || resp.headers.contains("Transfer-Encoding");
    if !framed && !resp.status.is_bodiless() {
        put_header(dst, "Content-Length", &resp.body.len().to_string());
    }

    // Header/body separator
    dst.put_slice(b"\r\n");
}

fn put_header(dst: &mut BytesMut, name: &str, value: &str) {
    dst.put_slice(name.as_bytes());
    dst.put_slice(b": ");
    dst.put_slice(value.as_bytes());
    dst.put_slice(b"\r\n");
}

/// Serializes `resp` into a fresh buffer.
pub fn serialize_response(resp: &Response) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_response(resp, &mut buf);
    buf.to_vec()
}
