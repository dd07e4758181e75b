mod common;

use common::{ScriptedTransport, drive, output};
use spinserve::config::ConnectionConfig;
use spinserve::handler::Handler;
use spinserve::http::codec::HttpCodec;
use spinserve::http::request::{Method, Request, RequestBuilder};
use spinserve::http::response::{Response, StatusCode};
use spinserve::http::router::{Params, Pattern, Route, RouteResult, Router};
use spinserve::poll::{PollOutcome, Pollable};
use spinserve::server::Connection;

fn router() -> Router {
    Router::new(vec![
        Route::new(Method::GET, "/", |_req: Request, _params: &Params| {
            Response::ok("home")
        }),
        Route::new(Method::GET, "/users/:id", |_req: Request, params: &Params| {
            Response::ok(format!("user {}", params.get("id").unwrap_or("?")))
        }),
        Route::new(Method::POST, "/users/:id", |req: Request, params: &Params| {
            let id = params.get("id").unwrap_or("?");
            Response::ok(format!("updated {id} with {} bytes", req.body.len()))
        }),
        Route::new(Method::GET, "/static/*", |_req: Request, params: &Params| {
            Response::ok(params.get("*").unwrap_or("").to_string())
        }),
    ])
}

fn get(path: &str) -> Request {
    RequestBuilder::new()
        .method(Method::GET)
        .path(path)
        .build()
        .unwrap()
}

fn respond(router: &mut Router, request: Request) -> Response {
    match router.handle(request).poll() {
        Ok(PollOutcome::Ready(response)) => response,
        other => panic!("router reply not ready: {other:?}"),
    }
}

#[test]
fn test_pattern_captures_in_order() {
    let p = Pattern::new("/repos/:owner/:name/issues");
    let params = p.match_uri("/repos/rust-lang/cargo/issues?state=open").unwrap();

    let captured: Vec<_> = params.iter().collect();
    assert_eq!(captured, vec![("owner", "rust-lang"), ("name", "cargo")]);
}

#[test]
fn test_router_dispatches_by_path() {
    let mut router = router();

    assert_eq!(respond(&mut router, get("/")).body, b"home".to_vec());
    assert_eq!(respond(&mut router, get("/users/42")).body, b"user 42".to_vec());
    assert_eq!(
        respond(&mut router, get("/static/css/site.css")).body,
        b"css/site.css".to_vec()
    );
}

#[test]
fn test_router_dispatches_by_method() {
    let mut router = router();
    let post = RequestBuilder::new()
        .method(Method::POST)
        .path("/users/7")
        .body("abc")
        .build()
        .unwrap();

    assert_eq!(respond(&mut router, post).body, b"updated 7 with 3 bytes".to_vec());
}

#[test]
fn test_router_not_found() {
    let mut router = router();

    match router.route(get("/missing")) {
        RouteResult::NotFound(req) => assert_eq!(req.path, "/missing"),
        other => panic!("expected NotFound, got {other:?}"),
    }
    assert_eq!(respond(&mut router, get("/users")).status, StatusCode::NOT_FOUND);
}

#[test]
fn test_router_method_not_allowed() {
    let mut router = router();
    let delete = RequestBuilder::new()
        .method(Method::DELETE)
        .path("/users/1")
        .build()
        .unwrap();

    let response = respond(&mut router, delete);
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.header("Allow"), Some("GET, POST"));
}

#[test]
fn test_router_behind_connection() {
    let (transport, written) = ScriptedTransport::chunked(&[
        b"GET /users/5 HTTP/1.1\r\n\r\n",
        b"GET /nope HTTP/1.1\r\nConnection: close\r\n\r\n",
    ]);
    let cfg = ConnectionConfig {
        read_chunk_size: 64,
        idle_timeout_ms: 0,
        handler_timeout_ms: 0,
    };
    let mut conn = Connection::new(transport, HttpCodec::default(), router(), &cfg);

    assert!(drive(&mut conn, 100).expect("unfinished").is_ok());
    let wire = output(&written);
    assert!(
        wire.starts_with("HTTP/1.1 200 OK\r\nContent-Length: 6\r\n\r\nuser 5"),
        "{wire}"
    );
    assert!(wire.contains("HTTP/1.1 404 Not Found\r\n"), "{wire}");
}
