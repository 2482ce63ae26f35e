use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll, Waker};

use tokio_util::sync::CancellationToken;

use crate::kernel::lock;
use crate::notify::{Listener, NotificationChannel};

use super::CancelReason;

/// Name of the single notification a signal ever dispatches.
pub const ABORT: &str = "abort";

/// One-shot, monotonic cancellation flag.
///
/// A signal only ever moves from *unset* to *cancelled*, and does so through
/// its [`Controller`](super::Controller). At that instant it dispatches one
/// [`ABORT`] notification carrying the reason to every listener attached at
/// that moment. Listeners added later never see it; they must check
/// [`is_cancelled`](Self::is_cancelled).
///
/// Cloning yields another handle to the **same** signal.
#[derive(Clone)]
pub struct Signal {
    inner: Arc<SignalInner>,
}

struct SignalInner {
    reason: Mutex<Option<CancelReason>>,
    channel: NotificationChannel<CancelReason>,
    /// Subscriptions on source signals held by a merged controller.
    links: Mutex<Vec<Listener<CancelReason>>>,
}

/// Non-owning handle used by listeners that must not keep a signal alive.
#[derive(Clone)]
pub(crate) struct WeakSignal(Weak<SignalInner>);

impl Signal {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(SignalInner {
                reason: Mutex::new(None),
                channel: NotificationChannel::new(),
                links: Mutex::new(Vec::new()),
            }),
        }
    }

    /// A signal with no controller: it can never be cancelled.
    pub fn never() -> Self {
        Self::new()
    }

    /// Returns `true` once cancelled.
    pub fn is_cancelled(&self) -> bool {
        lock(&self.inner.reason).is_some()
    }

    /// Reason passed to the first effective `cancel`, if cancelled.
    pub fn reason(&self) -> Option<CancelReason> {
        lock(&self.inner.reason).clone()
    }

    /// Registers `callback` for the abort notification.
    pub fn on_abort<F>(&self, callback: F) -> Listener<CancelReason>
    where
        F: Fn(&CancelReason) + Send + Sync + 'static,
    {
        self.inner.channel.add_listener(ABORT, callback)
    }

    /// Registers `callback` for the abort notification; it detaches after firing.
    pub fn on_abort_once<F>(&self, callback: F) -> Listener<CancelReason>
    where
        F: FnOnce(&CancelReason) + Send + 'static,
    {
        self.inner.channel.add_listener_once(ABORT, callback)
    }

    /// Number of listeners currently waiting for the abort notification.
    pub fn listener_count(&self) -> usize {
        self.inner.channel.listener_count(ABORT)
    }

    /// Future resolving with the reason once the signal is cancelled.
    ///
    /// Resolves immediately if already cancelled. Dropping it removes its listener.
    pub fn cancelled(&self) -> Cancelled {
        Cancelled {
            signal: self.clone(),
            waker: Arc::new(Mutex::new(None)),
            listener: None,
        }
    }

    /// Returns `true` if both handles refer to the same signal.
    pub fn is_same(&self, other: &Signal) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Exposes the signal as a [`CancellationToken`] for external collaborators
    /// (transports, spawned workers). The token is cancelled when the signal is.
    pub fn to_external_abort_handle(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if self.is_cancelled() {
            token.cancel();
            return token;
        }
        let t = token.clone();
        let listener = self.on_abort_once(move |_| t.cancel());
        if self.is_cancelled() {
            listener.detach();
            token.cancel();
        }
        token
    }

    /// Transitions to cancelled. Returns `false` if already cancelled.
    ///
    /// The abort notification is queued while the state lock is held so two
    /// racing callers cannot reorder it, then delivered after the lock is released.
    pub(crate) fn cancel(&self, reason: CancelReason) -> bool {
        {
            let mut slot = lock(&self.inner.reason);
            if slot.is_some() {
                return false;
            }
            *slot = Some(reason.clone());
            self.inner.channel.post(ABORT, reason);
        }
        self.inner.channel.flush();
        true
    }

    pub(crate) fn downgrade(&self) -> WeakSignal {
        WeakSignal(Arc::downgrade(&self.inner))
    }

    /// Stores subscriptions on source signals; they are detached when this
    /// signal is cancelled or dropped.
    pub(crate) fn hold_links(&self, links: Vec<Listener<CancelReason>>) {
        lock(&self.inner.links).extend(links);
    }

    pub(crate) fn release_links(&self) {
        self.inner.release_links();
    }
}

impl SignalInner {
    fn release_links(&self) {
        let links: Vec<_> = lock(&self.links).drain(..).collect();
        for link in links {
            link.detach();
        }
    }
}

impl Drop for SignalInner {
    fn drop(&mut self) {
        self.release_links();
    }
}

impl WeakSignal {
    pub(crate) fn upgrade(&self) -> Option<Signal> {
        self.0.upgrade().map(|inner| Signal { inner })
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("reason", &self.reason())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Future returned by [`Signal::cancelled`].
#[must_use = "futures do nothing unless polled"]
pub struct Cancelled {
    signal: Signal,
    waker: Arc<Mutex<Option<Waker>>>,
    listener: Option<Listener<CancelReason>>,
}

impl Future for Cancelled {
    type Output = CancelReason;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<CancelReason> {
        let this = self.get_mut();
        if let Some(reason) = this.signal.reason() {
            this.release();
            return Poll::Ready(reason);
        }

        *lock(&this.waker) = Some(cx.waker().clone());
        if this.listener.is_none() {
            let waker = Arc::clone(&this.waker);
            this.listener = Some(this.signal.on_abort_once(move |_| {
                if let Some(w) = lock(&waker).take() {
                    w.wake();
                }
            }));
        }

        // cancel may have landed between the first check and the registration
        match this.signal.reason() {
            Some(reason) => {
                this.release();
                Poll::Ready(reason)
            }
            None => Poll::Pending,
        }
    }
}

impl Cancelled {
    fn release(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.detach();
        }
    }
}

impl Drop for Cancelled {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancelled")
            .field("signal", &self.signal)
            .finish()
    }
}
