use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{Poll, PollOutcome, Pollable};

/// Shared flag used to ask running pollables to stop.
///
/// Tasks cannot be pre-empted; tripping the token only takes effect the next
/// time a [`Cancellable`] holding it is polled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelError<E> {
    Cancelled,
    Inner(E),
}

impl<E> CancelError<E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CancelError::Cancelled)
    }
}

impl<E: fmt::Display> fmt::Display for CancelError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelError::Cancelled => f.write_str("cancelled"),
            CancelError::Inner(e) => e.fmt(f),
        }
    }
}

impl<E: Error + 'static> Error for CancelError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CancelError::Cancelled => None,
            CancelError::Inner(e) => Some(e),
        }
    }
}

pub struct Cancellable<P> {
    inner: P,
    token: CancelToken,
    finished: bool,
}

impl<P> Cancellable<P> {
    pub(super) fn new(inner: P, token: CancelToken) -> Self {
        Self {
            inner,
            token,
            finished: false,
        }
    }
}

impl<P: Pollable> Pollable for Cancellable<P> {
    type Item = P::Item;
    type Error = CancelError<P::Error>;

    fn poll(&mut self) -> Poll<P::Item, Self::Error> {
        if self.finished {
            panic!("Cancellable polled after completion");
        }
        if self.token.is_cancelled() {
            self.finished = true;
            return Err(CancelError::Cancelled);
        }

        let result = self.inner.poll().map_err(CancelError::Inner);
        self.finished = !matches!(result, Ok(PollOutcome::NotReady));
        result
    }
}
