use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::{BoxFuture, Shared};

use crate::signal::{Outcome, Signal};

/// Cloneable handle to a registered operation.
///
/// Every clone observes the same [`Outcome`]. The operation is driven by the
/// runtime whether or not anyone awaits it, and its registry entry is removed
/// before any awaiter sees the outcome.
#[must_use = "futures do nothing unless polled"]
pub struct Operation<T, E> {
    shared: Shared<BoxFuture<'static, Outcome<T, E>>>,
    signal: Signal,
}

impl<T, E> Operation<T, E>
where
    T: Clone,
    E: Clone,
{
    pub(super) fn new(shared: Shared<BoxFuture<'static, Outcome<T, E>>>, signal: Signal) -> Self {
        Self { shared, signal }
    }

    /// Signal of the operation's own cancellation scope.
    pub fn signal(&self) -> &Signal {
        &self.signal
    }

    /// Outcome, if the operation already settled.
    pub fn peek(&self) -> Option<&Outcome<T, E>> {
        self.shared.peek()
    }

    /// Returns `true` once the operation settled.
    pub fn is_settled(&self) -> bool {
        self.peek().is_some()
    }
}

impl<T, E> Future for Operation<T, E>
where
    T: Clone,
    E: Clone,
{
    type Output = Outcome<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.shared).poll(cx)
    }
}

impl<T, E> Clone for Operation<T, E>
where
    T: Clone,
    E: Clone,
{
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            signal: self.signal.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Operation<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("signal", &self.signal)
            .finish_non_exhaustive()
    }
}
