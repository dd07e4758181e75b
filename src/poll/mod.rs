//! The poll primitive.
//!
//! Everything asynchronous in spinserve is a [`Pollable`]: a value that is
//! driven to completion by calling [`Pollable::poll`] over and over. A call
//! never blocks and does a small, bounded amount of work.
//!
//! # Outcomes
//!
//! ```text
//!   poll() ──┬── Ok(NotReady)   → not finished, call again later
//!            ├── Ok(Ready(v))   → finished with `v`, never poll again
//!            └── Err(e)         → failed, never poll again
//! ```
//!
//! `NotReady` carries no timing hint. Whoever drives the pollable (normally
//! the [`Scheduler`](crate::server::scheduler::Scheduler)) decides when to
//! come back.
//!
//! # Composition
//!
//! Larger operations are built by polling smaller ones and returning
//! `NotReady` whenever an inner step is incomplete. The provided adapter
//! methods cover the common shapes:
//!
//! ```
//! use spinserve::poll::{ready, PollOutcome, Pollable};
//!
//! let mut sum = ready::<u32, ()>(2)
//!     .join(ready::<u32, ()>(40))
//!     .map(|(a, b)| a + b);
//!
//! assert_eq!(sum.poll(), Ok(PollOutcome::Ready(42)));
//! ```

mod cancel;
mod combinators;
mod timeout;

use std::io;
use std::time::Duration;

pub use cancel::{CancelError, CancelToken, Cancellable};
pub use combinators::{AndThen, Done, Join, Map, MapErr, PollFn, failed, from_result, poll_fn, ready};
pub use timeout::{Timeout, TimeoutError};

/// Result of a single successful poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The operation finished with this value.
    Ready(T),
    /// The operation needs to be polled again.
    NotReady,
}

impl<T> PollOutcome<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, PollOutcome::Ready(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> PollOutcome<U> {
        match self {
            PollOutcome::Ready(v) => PollOutcome::Ready(f(v)),
            PollOutcome::NotReady => PollOutcome::NotReady,
        }
    }
}

/// Return type of [`Pollable::poll`].
pub type Poll<T, E> = Result<PollOutcome<T>, E>;

/// A unit of asynchronous work advanced by repeated non-blocking polls.
///
/// Implementations own whatever partial state the operation needs between
/// calls (buffers, inner pollables). Once `poll` has returned `Ready` or an
/// error, the pollable is finished; polling it again is a contract violation
/// and the adapters in this module panic when it happens.
pub trait Pollable {
    type Item;
    type Error;

    fn poll(&mut self) -> Poll<Self::Item, Self::Error>;

    /// Transforms the final value.
    fn map<F, U>(self, f: F) -> Map<Self, F>
    where
        F: FnOnce(Self::Item) -> U,
        Self: Sized,
    {
        Map::new(self, f)
    }

    /// Transforms the error.
    fn map_err<F, E>(self, f: F) -> MapErr<Self, F>
    where
        F: FnOnce(Self::Error) -> E,
        Self: Sized,
    {
        MapErr::new(self, f)
    }

    /// Runs `f` on the final value and continues with the pollable it returns.
    fn and_then<F, B>(self, f: F) -> AndThen<Self, B, F>
    where
        F: FnOnce(Self::Item) -> B,
        B: Pollable,
        B::Error: From<Self::Error>,
        Self: Sized,
    {
        AndThen::new(self, f)
    }

    /// Polls both sides until each has finished and yields both values.
    fn join<R>(self, other: R) -> Join<Self, R>
    where
        R: Pollable,
        Self::Error: From<R::Error>,
        Self: Sized,
    {
        Join::new(self, other)
    }

    /// Fails with [`TimeoutError::Elapsed`] once `limit` has passed since
    /// the first poll. The deadline is checked once per poll.
    fn timeout(self, limit: Duration) -> Timeout<Self>
    where
        Self: Sized,
    {
        Timeout::new(self, Some(limit))
    }

    /// Fails with [`CancelError::Cancelled`] on the first poll after `token`
    /// has been tripped.
    fn cancellable(self, token: CancelToken) -> Cancellable<Self>
    where
        Self: Sized,
    {
        Cancellable::new(self, token)
    }
}

impl<P: Pollable + ?Sized> Pollable for Box<P> {
    type Item = P::Item;
    type Error = P::Error;

    fn poll(&mut self) -> Poll<Self::Item, Self::Error> {
        (**self).poll()
    }
}

/// Lifts a non-blocking I/O result into a poll result.
///
/// `WouldBlock` and `Interrupted` mean "try again on the next poll"; every
/// other error is passed through.
pub fn poll_io<T>(result: io::Result<T>) -> io::Result<PollOutcome<T>> {
    match result {
        Ok(value) => Ok(PollOutcome::Ready(value)),
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {
            Ok(PollOutcome::NotReady)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_io_maps_would_block_to_not_ready() {
        let r: io::Result<usize> = Err(io::ErrorKind::WouldBlock.into());
        assert_eq!(poll_io(r).unwrap(), PollOutcome::NotReady);

        let r: io::Result<usize> = Err(io::ErrorKind::Interrupted.into());
        assert_eq!(poll_io(r).unwrap(), PollOutcome::NotReady);
    }

    #[test]
    fn poll_io_passes_other_errors_through() {
        let r: io::Result<usize> = Err(io::ErrorKind::ConnectionReset.into());
        assert_eq!(poll_io(r).unwrap_err().kind(), io::ErrorKind::ConnectionReset);
        assert_eq!(poll_io(Ok(7)).unwrap(), PollOutcome::Ready(7));
    }

    #[test]
    fn boxed_pollables_delegate() {
        let mut boxed: Box<dyn Pollable<Item = u8, Error = ()>> = Box::new(ready(3));
        assert_eq!(boxed.poll(), Ok(PollOutcome::Ready(3)));
    }
}
