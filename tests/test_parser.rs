use bytes::BytesMut;
use spinserve::config::HttpConfig;
use spinserve::http::parser::{ParseError, RequestParser, parse_http_request};
use spinserve::http::request::{Method, Request, Version};

/// Feeds `chunks` one at a time, as separate reads would deliver them.
fn parse_chunks(chunks: &[&[u8]]) -> Result<Vec<Request>, ParseError> {
    let mut parser = RequestParser::new(HttpConfig::default());
    let mut buf = BytesMut::new();
    let mut out = Vec::new();
    for chunk in chunks {
        buf.extend_from_slice(chunk);
        while let Some(req) = parser.parse(&mut buf)? {
            out.push(req);
        }
    }
    Ok(out)
}

fn limits(max_header_bytes: usize, max_headers: usize, max_body_bytes: usize) -> HttpConfig {
    HttpConfig {
        max_header_bytes,
        max_headers,
        max_body_bytes,
    }
}

#[test]
fn test_parse_simple_get_request() {
    let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";
    let (parsed, consumed) = parse_http_request(req).unwrap().unwrap();

    assert_eq!(parsed.method, Method::GET);
    assert_eq!(parsed.path, "/");
    assert_eq!(parsed.version, Version::Http11);
    assert_eq!(parsed.headers.get("Host").unwrap(), "example.com");
    assert_eq!(consumed, req.len());
}

#[test]
fn test_parse_post_request_with_body() {
    let req = b"POST /api HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhello";
    let (parsed, consumed) = parse_http_request(req).unwrap().unwrap();

    assert_eq!(parsed.method, Method::POST);
    assert_eq!(parsed.path, "/api");
    assert_eq!(parsed.body, b"hello".to_vec());
    assert_eq!(consumed, req.len());
}

#[test]
fn test_parse_multiple_headers() {
    let req = b"GET /path HTTP/1.1\r\nHost: example.com\r\nUser-Agent: test-client\r\nAccept: */*\r\n\r\n";
    let (parsed, _) = parse_http_request(req).unwrap().unwrap();

    assert_eq!(parsed.headers.get("Host").unwrap(), "example.com");
    assert_eq!(parsed.headers.get("User-Agent").unwrap(), "test-client");
    assert_eq!(parsed.headers.get("Accept").unwrap(), "*/*");

    let names: Vec<_> = parsed.headers.iter().map(|(k, _)| k).collect();
    assert_eq!(names, vec!["Host", "User-Agent", "Accept"]);
}

#[test]
fn test_parse_request_with_path_and_query_string() {
    let req = b"GET /search?q=rust HTTP/1.1\r\nHost: example.com\r\n\r\n";
    let (parsed, _) = parse_http_request(req).unwrap().unwrap();

    assert_eq!(parsed.path, "/search?q=rust");
    assert_eq!(parsed.path_only(), "/search");
}

#[test]
fn test_parse_incomplete_request_missing_blank_line() {
    let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n";
    assert_eq!(parse_http_request(req), Ok(None));
}

#[test]
fn test_parse_incomplete_request_partial_body() {
    let req = b"POST /api HTTP/1.1\r\nContent-Length: 10\r\n\r\nhello";
    assert_eq!(parse_http_request(req), Ok(None));
}

#[test]
fn test_parse_invalid_http_method() {
    let req = b"INVALID / HTTP/1.1\r\n\r\n";
    assert_eq!(parse_http_request(req), Err(ParseError::InvalidMethod));

    let lower = b"get / HTTP/1.1\r\n\r\n";
    assert_eq!(parse_http_request(lower), Err(ParseError::InvalidMethod));
}

#[test]
fn test_parse_missing_version_token() {
    let req = b"GET /\r\nHost: x\r\n\r\n";
    assert_eq!(parse_http_request(req), Err(ParseError::InvalidRequestLine));
}

#[test]
fn test_parse_unsupported_version() {
    let req = b"GET / HTTP/2.0\r\n\r\n";
    assert_eq!(parse_http_request(req), Err(ParseError::UnsupportedVersion));
}

#[test]
fn test_parse_http10_request() {
    let req = b"GET / HTTP/1.0\r\n\r\n";
    let (parsed, _) = parse_http_request(req).unwrap().unwrap();
    assert_eq!(parsed.version, Version::Http10);
}

#[test]
fn test_parse_malformed_header() {
    let req = b"GET / HTTP/1.1\r\nBrokenHeader\r\n\r\n";
    assert_eq!(parse_http_request(req), Err(ParseError::InvalidHeader));
}

#[test]
fn test_parse_rejects_folded_header() {
    let req = b"GET / HTTP/1.1\r\nX-A: one\r\n two\r\n\r\n";
    assert_eq!(parse_http_request(req), Err(ParseError::InvalidHeader));
}

#[test]
fn test_parse_rejects_space_before_colon() {
    let req = b"GET / HTTP/1.1\r\nHost : x\r\n\r\n";
    assert_eq!(parse_http_request(req), Err(ParseError::InvalidHeader));
}

#[test]
fn test_parse_rejects_bare_line_feed() {
    let req = b"GET / HTTP/1.1\nHost: x\n\n";
    assert_eq!(parse_http_request(req), Err(ParseError::BareLineFeed));
}

#[test]
fn test_parse_various_http_methods() {
    let methods = vec![
        ("GET", Method::GET),
        ("POST", Method::POST),
        ("PUT", Method::PUT),
        ("DELETE", Method::DELETE),
        ("HEAD", Method::HEAD),
        ("OPTIONS", Method::OPTIONS),
        ("PATCH", Method::PATCH),
        ("CONNECT", Method::CONNECT),
        ("TRACE", Method::TRACE),
    ];

    for (method_str, expected_method) in methods {
        let req = format!("{} / HTTP/1.1\r\n\r\n", method_str);
        let (parsed, _) = parse_http_request(req.as_bytes()).unwrap().unwrap();
        assert_eq!(parsed.method, expected_method);
    }
}

#[test]
fn test_parse_request_with_empty_body() {
    let req = b"POST /api HTTP/1.1\r\nContent-Length: 0\r\n\r\n";
    let (parsed, _) = parse_http_request(req).unwrap().unwrap();

    assert_eq!(parsed.body.len(), 0);
}

#[test]
fn test_parse_request_with_binary_body() {
    let req = b"POST /upload HTTP/1.1\r\nContent-Length: 4\r\n\r\n\x00\x01\x02\x03";
    let (parsed, _) = parse_http_request(req).unwrap().unwrap();

    assert_eq!(parsed.body, vec![0, 1, 2, 3]);
}

#[test]
fn test_parse_repeated_headers_are_combined() {
    let req = b"GET / HTTP/1.1\r\nAccept: text/html\r\naccept: */*\r\n\r\n";
    let (parsed, _) = parse_http_request(req).unwrap().unwrap();

    assert_eq!(parsed.header("Accept"), Some("text/html, */*"));
}

#[test]
fn test_parse_conflicting_content_length() {
    let req = b"POST / HTTP/1.1\r\nContent-Length: 5\r\nContent-Length: 6\r\n\r\nhello!";
    assert_eq!(parse_http_request(req), Err(ParseError::InvalidContentLength));

    let agreeing = b"POST / HTTP/1.1\r\nContent-Length: 5\r\nContent-Length: 5\r\n\r\nhello";
    let (parsed, _) = parse_http_request(agreeing).unwrap().unwrap();
    assert_eq!(parsed.body, b"hello".to_vec());
}

#[test]
fn test_parse_invalid_content_length() {
    let req = b"POST / HTTP/1.1\r\nContent-Length: -1\r\n\r\n";
    assert_eq!(parse_http_request(req), Err(ParseError::InvalidContentLength));
}

#[test]
fn test_parse_transfer_encoding_unsupported() {
    let req = b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n";
    assert_eq!(
        parse_http_request(req),
        Err(ParseError::UnsupportedTransferEncoding)
    );
}

#[test]
fn test_parse_header_section_limit() {
    let mut parser = RequestParser::new(limits(32, 100, 1024));
    let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\nX-Long: aaaaaaaaaaaaaaaaaaaa\r\n\r\n"[..]);
    assert_eq!(parser.parse(&mut buf), Err(ParseError::HeadersTooLarge(32)));
}

#[test]
fn test_parse_header_limit_without_newline() {
    let mut parser = RequestParser::new(limits(16, 100, 1024));
    let mut buf = BytesMut::from(&b"GET /aaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"[..]);
    assert_eq!(parser.parse(&mut buf), Err(ParseError::HeadersTooLarge(16)));
}

#[test]
fn test_parse_too_many_headers() {
    let mut parser = RequestParser::new(limits(8192, 2, 1024));
    let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\nA: 1\r\nB: 2\r\nC: 3\r\n\r\n"[..]);
    assert_eq!(parser.parse(&mut buf), Err(ParseError::TooManyHeaders(2)));
}

#[test]
fn test_parse_body_limit() {
    let mut parser = RequestParser::new(limits(8192, 100, 4));
    let mut buf = BytesMut::from(&b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello"[..]);
    assert_eq!(parser.parse(&mut buf), Err(ParseError::BodyTooLarge(4)));
}

#[test]
fn test_parse_resumable_at_every_split() {
    let raw: &[u8] = b"POST /submit?x=1 HTTP/1.1\r\nHost: a\r\nContent-Length: 11\r\nX-Trace: t\r\n\r\nhello world";
    let whole = parse_chunks(&[raw]).unwrap();
    assert_eq!(whole.len(), 1);

    for split in 0..=raw.len() {
        let (a, b) = raw.split_at(split);
        let parts = parse_chunks(&[a, b]).unwrap();
        assert_eq!(parts, whole, "split at {split}");
    }

    for first in 1..raw.len() {
        for second in first..raw.len() {
            let parts = parse_chunks(&[&raw[..first], &raw[first..second], &raw[second..]]).unwrap();
            assert_eq!(parts, whole, "splits at {first}, {second}");
        }
    }
}

#[test]
fn test_parse_byte_by_byte() {
    let raw: &[u8] = b"PUT /item HTTP/1.1\r\nContent-Length: 3\r\n\r\nabc";
    let chunks: Vec<&[u8]> = raw.chunks(1).collect();

    let parsed = parse_chunks(&chunks).unwrap();
    assert_eq!(parsed, parse_chunks(&[raw]).unwrap());
    assert_eq!(parsed[0].body, b"abc".to_vec());
}

#[test]
fn test_parse_pipelined_requests() {
    let raw = b"GET /one HTTP/1.1\r\n\r\nGET /two HTTP/1.1\r\n\r\n";
    let parsed = parse_chunks(&[raw]).unwrap();

    let paths: Vec<_> = parsed.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["/one", "/two"]);
}

#[test]
fn test_parse_leaves_next_request_in_buffer() {
    let raw = b"GET /one HTTP/1.1\r\n\r\nGET /tw";
    let (parsed, consumed) = parse_http_request(raw).unwrap().unwrap();

    assert_eq!(parsed.path, "/one");
    assert_eq!(&raw[consumed..], b"GET /tw");
}
