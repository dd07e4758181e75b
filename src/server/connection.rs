//! Per-connection state machine.
//!
//! ```text
//!        ┌─────────────┐
//!   ┌──► │   Reading   │ ← read + decode, one read per poll
//!   │    └──────┬──────┘
//!   │           │ request decoded
//!   │           ▼
//!   │    ┌──────────────────┐
//!   │    │   Dispatching    │ ← poll the handler's reply
//!   │    └──────┬───────────┘
//!   │           │ response ready (or error response)
//!   │           ▼
//!   │    ┌──────────────────┐
//!   │    │    Writing       │ ← one write per poll
//!   │    └──────┬───────────┘
//!   │           │ all bytes written
//!   └───────────┤ keep-alive
//!               └─ close → Closed
//! ```
//!
//! `Failed` is reachable from every phase and is reported as an error from
//! [`Pollable::poll`]; `Closed` is reported as `Ready(())`.

use std::fmt;
use std::io::{Read, Write};
use std::mem;
use std::time::{Duration, Instant};

use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

use crate::codec::{DecodeOutcome, HandlerFailure, Protocol};
use crate::config::ConnectionConfig;
use crate::error::ConnectionError;
use crate::handler::Handler;
use crate::poll::{Poll, PollOutcome, Pollable, Timeout, TimeoutError, poll_io};

/// Observable lifecycle phase of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Reading,
    Dispatching,
    Writing,
    Closed,
    Failed,
}

enum Phase<R> {
    Reading,
    Dispatching { reply: Timeout<R>, keep_alive: bool },
    Writing { keep_alive: bool },
    Closed,
    Failed,
}

/// One accepted transport driven through decode, dispatch and write.
///
/// The transport must be non-blocking: reads and writes that cannot make
/// progress return `WouldBlock`, which the connection turns into
/// `NotReady`.
pub struct Connection<T, P, H: Handler> {
    transport: T,
    peer: String,
    protocol: P,
    handler: H,
    read_buf: BytesMut,
    scratch: Vec<u8>,
    write_buf: BytesMut,
    phase: Phase<H::Reply>,
    idle_timeout: Option<Duration>,
    handler_timeout: Option<Duration>,
    last_activity: Instant,
    /// Bytes of an unfinished request have been received.
    in_progress: bool,
    served: u64,
}

impl<T, P, H> Connection<T, P, H>
where
    T: Read + Write,
    P: Protocol,
    H: Handler<Request = P::Request, Response = P::Response>,
    H::Error: fmt::Display,
{
    pub fn new(transport: T, protocol: P, handler: H, config: &ConnectionConfig) -> Self {
        Self {
            transport,
            peer: String::from("-"),
            protocol,
            handler,
            read_buf: BytesMut::with_capacity(config.read_chunk_size),
            scratch: vec![0; config.read_chunk_size.max(1)],
            write_buf: BytesMut::new(),
            phase: Phase::Reading,
            idle_timeout: config.idle_timeout(),
            handler_timeout: config.handler_timeout(),
            last_activity: Instant::now(),
            in_progress: false,
            served: 0,
        }
    }

    /// Labels log lines with the remote address.
    pub fn with_peer(mut self, peer: impl Into<String>) -> Self {
        self.peer = peer.into();
        self
    }

    pub fn phase(&self) -> ConnectionPhase {
        match self.phase {
            Phase::Reading => ConnectionPhase::Reading,
            Phase::Dispatching { .. } => ConnectionPhase::Dispatching,
            Phase::Writing { .. } => ConnectionPhase::Writing,
            Phase::Closed => ConnectionPhase::Closed,
            Phase::Failed => ConnectionPhase::Failed,
        }
    }

    /// Responses produced by the handler so far.
    pub fn requests_served(&self) -> u64 {
        self.served
    }

    fn read(&mut self) -> Result<Phase<H::Reply>, ConnectionError> {
        if !self.read_buf.is_empty() {
            if let Some(next) = self.decode() {
                return Ok(next);
            }
        }

        match poll_io(self.transport.read(&mut self.scratch)).map_err(ConnectionError::Read)? {
            PollOutcome::NotReady => {
                let idle = self
                    .idle_timeout
                    .is_some_and(|limit| self.last_activity.elapsed() >= limit);
                if !idle {
                    return Ok(Phase::Reading);
                }
                if self.in_progress {
                    debug!(peer = %self.peer, "Request stalled, closing connection");
                    let response = self.protocol.stalled_request_response();
                    return Ok(self.respond_and_close(response));
                }
                debug!(peer = %self.peer, "Idle timeout, closing connection");
                Ok(Phase::Closed)
            }
            PollOutcome::Ready(0) => {
                if self.in_progress {
                    return Err(ConnectionError::UnexpectedEof);
                }
                debug!(peer = %self.peer, served = self.served, "Peer closed connection");
                Ok(Phase::Closed)
            }
            PollOutcome::Ready(n) => {
                self.read_buf.extend_from_slice(&self.scratch[..n]);
                self.in_progress = true;
                self.last_activity = Instant::now();
                Ok(self.decode().unwrap_or(Phase::Reading))
            }
        }
    }

    /// Runs the decoder over buffered bytes. `None` means more data is needed.
    fn decode(&mut self) -> Option<Phase<H::Reply>> {
        match self.protocol.decode(&mut self.read_buf) {
            Ok(DecodeOutcome::NeedMoreData) => None,
            Ok(DecodeOutcome::Decoded(request)) => {
                self.in_progress = !self.read_buf.is_empty();
                let keep_alive = self.protocol.keep_alive(&request);
                let reply = Timeout::new(self.handler.handle(request), self.handler_timeout);
                trace!(peer = %self.peer, "Request decoded");
                Some(Phase::Dispatching { reply, keep_alive })
            }
            Err(e) => {
                debug!(peer = %self.peer, error = %e, "Malformed request");
                let response = self.protocol.decode_error_response(&e);
                Some(self.respond_and_close(response))
            }
        }
    }

    fn dispatch(
        &mut self,
        mut reply: Timeout<H::Reply>,
        keep_alive: bool,
    ) -> Result<Phase<H::Reply>, ConnectionError> {
        let failure = match reply.poll() {
            Ok(PollOutcome::NotReady) => return Ok(Phase::Dispatching { reply, keep_alive }),
            Ok(PollOutcome::Ready(response)) => {
                self.served += 1;
                let keep_alive = keep_alive && !self.protocol.closes_after(&response);
                self.protocol.encode(response, &mut self.write_buf);
                return Ok(Phase::Writing { keep_alive });
            }
            Err(TimeoutError::Elapsed(limit)) => {
                debug!(peer = %self.peer, ?limit, "Handler timed out");
                (HandlerFailure::TimedOut, format!("timed out after {limit:?}"))
            }
            Err(TimeoutError::Inner(e)) => {
                debug!(peer = %self.peer, error = %e, "Handler failed");
                (HandlerFailure::Error, e.to_string())
            }
        };

        let (kind, message) = failure;
        match self.protocol.handler_error_response(kind) {
            Some(response) => Ok(self.respond_and_close(Some(response))),
            None => Err(ConnectionError::Handler(message)),
        }
    }

    fn respond_and_close(&mut self, response: Option<P::Response>) -> Phase<H::Reply> {
        match response {
            Some(response) => {
                self.protocol.encode(response, &mut self.write_buf);
                Phase::Writing { keep_alive: false }
            }
            None => Phase::Closed,
        }
    }

    fn write(&mut self, keep_alive: bool) -> Result<Phase<H::Reply>, ConnectionError> {
        if !self.write_buf.is_empty() {
            match poll_io(self.transport.write(&self.write_buf)).map_err(ConnectionError::Write)? {
                PollOutcome::NotReady => return Ok(Phase::Writing { keep_alive }),
                PollOutcome::Ready(0) => return Err(ConnectionError::WriteZero),
                PollOutcome::Ready(n) => {
                    self.write_buf.advance(n);
                    self.last_activity = Instant::now();
                }
            }
        }

        if !self.write_buf.is_empty() {
            return Ok(Phase::Writing { keep_alive });
        }
        if keep_alive {
            trace!(peer = %self.peer, "Response written, awaiting next request");
            Ok(Phase::Reading)
        } else {
            Ok(Phase::Closed)
        }
    }
}

impl<T, P, H> Pollable for Connection<T, P, H>
where
    T: Read + Write,
    P: Protocol,
    H: Handler<Request = P::Request, Response = P::Response>,
    H::Error: fmt::Display,
{
    type Item = ();
    type Error = ConnectionError;

    fn poll(&mut self) -> Poll<(), ConnectionError> {
        let next = match mem::replace(&mut self.phase, Phase::Failed) {
            Phase::Reading => self.read(),
            Phase::Dispatching { reply, keep_alive } => self.dispatch(reply, keep_alive),
            Phase::Writing { keep_alive } => self.write(keep_alive),
            Phase::Closed | Phase::Failed => panic!("Connection polled after completion"),
        };

        match next {
            Ok(Phase::Closed) => {
                self.phase = Phase::Closed;
                Ok(PollOutcome::Ready(()))
            }
            Ok(phase) => {
                self.phase = phase;
                Ok(PollOutcome::NotReady)
            }
            Err(e) => {
                debug!(peer = %self.peer, error = %e, "Connection failed");
                Err(e)
            }
        }
    }
}
