//! The application capability behind each connection.
//!
//! The connection state machine never looks inside a handler: it calls
//! [`Handler::handle`] once per decoded request and polls the returned
//! pollable until it yields the response.

use std::marker::PhantomData;

use crate::poll::Pollable;

pub trait Handler {
    type Request;
    type Response;
    type Error;
    /// The in-flight computation of one response.
    type Reply: Pollable<Item = Self::Response, Error = Self::Error>;

    fn handle(&mut self, request: Self::Request) -> Self::Reply;
}

/// Produces a fresh handler for every accepted connection, so handlers may
/// keep per-connection mutable state.
///
/// Any `Fn() -> H` closure qualifies.
pub trait NewHandler: Send + Sync + 'static {
    type Handler: Handler;

    fn new_handler(&self) -> Self::Handler;
}

impl<F, H> NewHandler for F
where
    F: Fn() -> H + Send + Sync + 'static,
    H: Handler,
{
    type Handler = H;

    fn new_handler(&self) -> H {
        self()
    }
}

/// A handler backed by a closure. See [`handler_fn`].
pub struct HandlerFn<F, Req> {
    f: F,
    _request: PhantomData<fn(Req)>,
}

/// Turns `FnMut(Request) -> impl Pollable` into a [`Handler`].
///
/// ```
/// use std::convert::Infallible;
/// use spinserve::handler::{handler_fn, Handler};
/// use spinserve::poll::{ready, PollOutcome, Pollable};
///
/// let mut upper = handler_fn(|line: String| ready::<_, Infallible>(line.to_uppercase()));
/// let mut reply = upper.handle("ping".to_string());
/// assert!(matches!(reply.poll(), Ok(PollOutcome::Ready(s)) if s == "PING"));
/// ```
pub fn handler_fn<F, Req, R>(f: F) -> HandlerFn<F, Req>
where
    F: FnMut(Req) -> R,
    R: Pollable,
{
    HandlerFn {
        f,
        _request: PhantomData,
    }
}

impl<F, Req, R> Handler for HandlerFn<F, Req>
where
    F: FnMut(Req) -> R,
    R: Pollable,
{
    type Request = Req;
    type Response = R::Item;
    type Error = R::Error;
    type Reply = R;

    fn handle(&mut self, request: Req) -> R {
        (self.f)(request)
    }
}
