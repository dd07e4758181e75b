use std::error::Error;
use std::fmt;
use std::time::{Duration, Instant};

use super::{Poll, PollOutcome, Pollable};

/// Error produced by [`Timeout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeoutError<E> {
    /// The deadline passed before the inner pollable finished.
    Elapsed(Duration),
    /// The inner pollable failed on its own.
    Inner(E),
}

impl<E> TimeoutError<E> {
    pub fn is_elapsed(&self) -> bool {
        matches!(self, TimeoutError::Elapsed(_))
    }
}

impl<E: fmt::Display> fmt::Display for TimeoutError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutError::Elapsed(limit) => write!(f, "timed out after {limit:?}"),
            TimeoutError::Inner(e) => e.fmt(f),
        }
    }
}

impl<E: Error + 'static> Error for TimeoutError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TimeoutError::Elapsed(_) => None,
            TimeoutError::Inner(e) => Some(e),
        }
    }
}

/// Coarse deadline around another pollable.
///
/// The clock starts at the first poll, not at construction, so time spent
/// waiting in a scheduler queue does not count. The check happens once per
/// poll, which bounds accuracy by poll frequency.
pub struct Timeout<P> {
    inner: P,
    limit: Option<Duration>,
    deadline: Option<Instant>,
    finished: bool,
}

impl<P> Timeout<P> {
    /// A `limit` of `None` never expires.
    pub fn new(inner: P, limit: Option<Duration>) -> Self {
        Self {
            inner,
            limit,
            deadline: None,
            finished: false,
        }
    }

    pub fn get_ref(&self) -> &P {
        &self.inner
    }
}

impl<P: Pollable> Pollable for Timeout<P> {
    type Item = P::Item;
    type Error = TimeoutError<P::Error>;

    fn poll(&mut self) -> Poll<P::Item, Self::Error> {
        if self.finished {
            panic!("Timeout polled after completion");
        }

        let now = Instant::now();
        if let Some(limit) = self.limit {
            let deadline = *self.deadline.get_or_insert(now + limit);
            if now >= deadline {
                self.finished = true;
                return Err(TimeoutError::Elapsed(limit));
            }
        }

        let result = self.inner.poll().map_err(TimeoutError::Inner);
        self.finished = !matches!(result, Ok(PollOutcome::NotReady));
        result
    }
}
