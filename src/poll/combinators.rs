use std::mem;

use super::{Poll, PollOutcome, Pollable};

/// A pollable that is finished on its first poll.
///
/// Built by [`ready`], [`failed`] and [`from_result`]; handlers that compute
/// their response synchronously return one of these.
#[derive(Debug)]
pub struct Done<T, E>(Option<Result<T, E>>);

pub fn ready<T, E>(value: T) -> Done<T, E> {
    Done(Some(Ok(value)))
}

pub fn failed<T, E>(error: E) -> Done<T, E> {
    Done(Some(Err(error)))
}

pub fn from_result<T, E>(result: Result<T, E>) -> Done<T, E> {
    Done(Some(result))
}

impl<T, E> Pollable for Done<T, E> {
    type Item = T;
    type Error = E;

    fn poll(&mut self) -> Poll<T, E> {
        match self.0.take() {
            Some(result) => result.map(PollOutcome::Ready),
            None => panic!("Done polled after completion"),
        }
    }
}

/// A pollable backed by a closure. See [`poll_fn`].
pub struct PollFn<F>(F);

/// Wraps a closure that behaves like [`Pollable::poll`].
pub fn poll_fn<F, T, E>(f: F) -> PollFn<F>
where
    F: FnMut() -> Poll<T, E>,
{
    PollFn(f)
}

impl<F, T, E> Pollable for PollFn<F>
where
    F: FnMut() -> Poll<T, E>,
{
    type Item = T;
    type Error = E;

    fn poll(&mut self) -> Poll<T, E> {
        (self.0)()
    }
}

pub struct Map<P, F> {
    inner: P,
    f: Option<F>,
}

impl<P, F> Map<P, F> {
    pub(super) fn new(inner: P, f: F) -> Self {
        Self { inner, f: Some(f) }
    }
}

impl<P, F, U> Pollable for Map<P, F>
where
    P: Pollable,
    F: FnOnce(P::Item) -> U,
{
    type Item = U;
    type Error = P::Error;

    fn poll(&mut self) -> Poll<U, P::Error> {
        match self.inner.poll()? {
            PollOutcome::NotReady => Ok(PollOutcome::NotReady),
            PollOutcome::Ready(item) => match self.f.take() {
                Some(f) => Ok(PollOutcome::Ready(f(item))),
                None => panic!("Map polled after completion"),
            },
        }
    }
}

pub struct MapErr<P, F> {
    inner: P,
    f: Option<F>,
}

impl<P, F> MapErr<P, F> {
    pub(super) fn new(inner: P, f: F) -> Self {
        Self { inner, f: Some(f) }
    }
}

impl<P, F, E> Pollable for MapErr<P, F>
where
    P: Pollable,
    F: FnOnce(P::Error) -> E,
{
    type Item = P::Item;
    type Error = E;

    fn poll(&mut self) -> Poll<P::Item, E> {
        match self.inner.poll() {
            Ok(outcome) => Ok(outcome),
            Err(e) => match self.f.take() {
                Some(f) => Err(f(e)),
                None => panic!("MapErr polled after completion"),
            },
        }
    }
}

enum Chain<A, B, F> {
    First(A, F),
    Second(B),
    Done,
}

pub struct AndThen<A, B, F> {
    state: Chain<A, B, F>,
}

impl<A, B, F> AndThen<A, B, F> {
    pub(super) fn new(first: A, f: F) -> Self {
        Self {
            state: Chain::First(first, f),
        }
    }
}

impl<A, B, F> Pollable for AndThen<A, B, F>
where
    A: Pollable,
    B: Pollable,
    B::Error: From<A::Error>,
    F: FnOnce(A::Item) -> B,
{
    type Item = B::Item;
    type Error = B::Error;

    fn poll(&mut self) -> Poll<B::Item, B::Error> {
        // The second stage gets its first poll in the same call that
        // finished the first stage.
        loop {
            match mem::replace(&mut self.state, Chain::Done) {
                Chain::First(mut first, f) => match first.poll() {
                    Ok(PollOutcome::Ready(item)) => self.state = Chain::Second(f(item)),
                    Ok(PollOutcome::NotReady) => {
                        self.state = Chain::First(first, f);
                        return Ok(PollOutcome::NotReady);
                    }
                    Err(e) => return Err(e.into()),
                },
                Chain::Second(mut second) => {
                    let result = second.poll();
                    if let Ok(PollOutcome::NotReady) = result {
                        self.state = Chain::Second(second);
                    }
                    return result;
                }
                Chain::Done => panic!("AndThen polled after completion"),
            }
        }
    }
}

enum Slot<P: Pollable> {
    Pending(P),
    Finished(P::Item),
    Taken,
}

impl<P: Pollable> Slot<P> {
    /// Advances the slot; returns whether it holds a finished value.
    fn advance(&mut self) -> Result<bool, P::Error> {
        match self {
            Slot::Pending(p) => match p.poll()? {
                PollOutcome::Ready(item) => {
                    *self = Slot::Finished(item);
                    Ok(true)
                }
                PollOutcome::NotReady => Ok(false),
            },
            Slot::Finished(_) => Ok(true),
            Slot::Taken => panic!("Join polled after completion"),
        }
    }

    fn take(&mut self) -> Option<P::Item> {
        match mem::replace(self, Slot::Taken) {
            Slot::Finished(item) => Some(item),
            _ => None,
        }
    }
}

/// Both halves are polled on every call until each has finished.
pub struct Join<A: Pollable, B: Pollable> {
    left: Slot<A>,
    right: Slot<B>,
}

impl<A: Pollable, B: Pollable> Join<A, B> {
    pub(super) fn new(left: A, right: B) -> Self {
        Self {
            left: Slot::Pending(left),
            right: Slot::Pending(right),
        }
    }
}

impl<A, B> Pollable for Join<A, B>
where
    A: Pollable,
    B: Pollable,
    A::Error: From<B::Error>,
{
    type Item = (A::Item, B::Item);
    type Error = A::Error;

    fn poll(&mut self) -> Poll<Self::Item, A::Error> {
        let left = self.left.advance().inspect_err(|_| {
            self.left = Slot::Taken;
            self.right = Slot::Taken;
        })?;
        let right = self.right.advance().map_err(|e| {
            self.left = Slot::Taken;
            self.right = Slot::Taken;
            A::Error::from(e)
        })?;

        if !(left && right) {
            return Ok(PollOutcome::NotReady);
        }

        match (self.left.take(), self.right.take()) {
            (Some(l), Some(r)) => Ok(PollOutcome::Ready((l, r))),
            _ => unreachable!("both join halves reported finished"),
        }
    }
}
