//! Path patterns and a method + path router.
//!
//! A pattern is a `/`-separated list of segments:
//!
//! - `api` matches that literal segment
//! - `:item` matches any one segment and captures it as `item`
//! - `*` (last segment only) matches whatever remains, including nothing,
//!   and captures it as `*`
//!
//! Matching ignores the query string, the fragment, and empty segments, so
//! `/api//users/` and `/api/users?page=2` both match `/api/users`.

use std::convert::Infallible;
use std::sync::Arc;

use crate::handler::Handler;
use crate::http::request::{Method, Request};
use crate::http::response::{Response, StatusCode};
use crate::poll::{Done, ready};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Exact(String),
    Param(String),
    Rest,
}

/// A compiled path pattern. See the module docs for the syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    segments: Vec<Segment>,
}

/// Named captures from a successful match, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn path_segments(uri: &str) -> impl Iterator<Item = &str> {
    let end = uri.find(['?', '#']).unwrap_or(uri.len());
    uri[..end].split('/').filter(|s| !s.is_empty())
}

impl Pattern {
    pub fn new(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty() && *s != ":")
            .map(|s| match s {
                "*" => Segment::Rest,
                _ => match s.strip_prefix(':') {
                    Some(name) => Segment::Param(name.to_string()),
                    None => Segment::Exact(s.to_string()),
                },
            })
            .collect();
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Matches `uri` segment by segment. Every pattern segment must be
    /// matched, and no uri segment may be left over unless the pattern
    /// ends in `*`.
    pub fn match_uri(&self, uri: &str) -> Option<Params> {
        let mut parts = path_segments(uri);
        let mut params = Vec::new();

        for segment in &self.segments {
            match segment {
                Segment::Rest => {
                    let rest: Vec<&str> = parts.by_ref().collect();
                    params.push(("*".to_string(), rest.join("/")));
                    return Some(Params(params));
                }
                Segment::Exact(expected) => {
                    if parts.next()? != expected.as_str() {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.push((name.clone(), parts.next()?.to_string()));
                }
            }
        }

        match parts.next() {
            Some(_) => None,
            None => Some(Params(params)),
        }
    }
}

/// Answers a request that matched a [`Route`].
///
/// Any `Fn(Request, &Params) -> Response` qualifies.
pub trait RouteHandler: Send + Sync {
    fn handle(&self, request: Request, params: &Params) -> Response;
}

impl<F> RouteHandler for F
where
    F: Fn(Request, &Params) -> Response + Send + Sync,
{
    fn handle(&self, request: Request, params: &Params) -> Response {
        self(request, params)
    }
}

pub struct Route {
    method: Method,
    pattern: Pattern,
    handler: Box<dyn RouteHandler>,
}

impl Route {
    pub fn new(method: Method, pattern: &str, handler: impl RouteHandler + 'static) -> Self {
        Self {
            method,
            pattern: Pattern::new(pattern),
            handler: Box::new(handler),
        }
    }
}

/// Outcome of [`Router::route`].
#[derive(Debug)]
pub enum RouteResult {
    Handled(Response),
    /// No route matched the path. The request is handed back.
    NotFound(Request),
    /// The path matched, but only for other methods.
    MethodNotAllowed(Request, Vec<Method>),
}

/// Dispatches requests to the first route whose method and pattern match.
///
/// Cloning is cheap and shares the route table, so a router can be handed
/// to every connection:
///
/// ```
/// use spinserve::http::request::{Method, Request};
/// use spinserve::http::response::Response;
/// use spinserve::http::router::{Params, Route, Router};
///
/// let router = Router::new(vec![Route::new(
///     Method::GET,
///     "/users/:id",
///     |_req: Request, params: &Params| {
///         Response::ok(format!("user {}", params.get("id").unwrap_or("")))
///     },
/// )]);
/// let new_handler = move || router.clone();
/// # let _ = new_handler;
/// ```
#[derive(Clone)]
pub struct Router {
    routes: Arc<Vec<Route>>,
}

impl Router {
    pub fn new(routes: Vec<Route>) -> Self {
        Self {
            routes: Arc::new(routes),
        }
    }

    pub fn route(&self, request: Request) -> RouteResult {
        let mut allowed = Vec::new();

        for route in self.routes.iter() {
            let Some(params) = route.pattern.match_uri(&request.path) else {
                continue;
            };
            if route.method == request.method {
                return RouteResult::Handled(route.handler.handle(request, &params));
            }
            if !allowed.contains(&route.method) {
                allowed.push(route.method);
            }
        }

        if allowed.is_empty() {
            RouteResult::NotFound(request)
        } else {
            RouteResult::MethodNotAllowed(request, allowed)
        }
    }
}

/// Unmatched paths get `404 Not Found`; a path served only under other
/// methods gets `405 Method Not Allowed` with an `Allow` header.
impl Handler for Router {
    type Request = Request;
    type Response = Response;
    type Error = Infallible;
    type Reply = Done<Response, Infallible>;

    fn handle(&mut self, request: Request) -> Self::Reply {
        let response = match self.route(request) {
            RouteResult::Handled(response) => response,
            RouteResult::NotFound(_) => Response::error(StatusCode::NOT_FOUND),
            RouteResult::MethodNotAllowed(_, allowed) => {
                let allow: Vec<&str> = allowed.iter().map(Method::as_str).collect();
                let mut response = Response::error(StatusCode::METHOD_NOT_ALLOWED);
                response.headers.insert("Allow", allow.join(", "));
                response
            }
        };
        ready(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_pattern() {
        let p = Pattern::new("/api/:item");
        assert_eq!(
            p.segments(),
            &[
                Segment::Exact("api".to_string()),
                Segment::Param("item".to_string())
            ]
        );
    }

    #[test]
    fn matches_and_ignores_query() {
        let p = Pattern::new("/api/:item");
        let params = p.match_uri("/api/resource?_filter=hello+world").unwrap();
        assert_eq!(params.get("item"), Some("resource"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn ignores_fragment_and_empty_segments() {
        let p = Pattern::new("/api/users");
        assert!(p.match_uri("/api//users/#top").is_some());
    }

    #[test]
    fn missing_or_extra_segments_fail() {
        let p = Pattern::new("/api/:item");
        assert_eq!(p.match_uri("/api"), None);
        assert_eq!(p.match_uri("/api/a/b"), None);
        assert_eq!(p.match_uri("/other/a"), None);
    }

    #[test]
    fn rest_captures_remaining_path() {
        let p = Pattern::new("/static/*");
        let params = p.match_uri("/static/css/site.css").unwrap();
        assert_eq!(params.get("*"), Some("css/site.css"));
        assert_eq!(p.match_uri("/static").unwrap().get("*"), Some(""));
    }

    #[test]
    fn root_pattern_matches_only_root() {
        let p = Pattern::new("/");
        assert!(p.match_uri("/").unwrap().is_empty());
        assert!(p.match_uri("/?x=1").is_some());
        assert!(p.match_uri("/x").is_none());
    }
}
