use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::kernel::lock;
use crate::notify::Listener;
use crate::signal::{settle_cancelled, CancelReason, Outcome, Signal, Strategy, WrapOptions};

use super::Resolver;

/// A future whose continuations are gated by a [`Signal`].
///
/// Once the signal is cancelled, no fulfillment or rejection continuation
/// chained with [`then`](Self::then), [`catch`](Self::catch) or
/// [`finally`](Self::finally) runs; the chain settles according to its
/// [`Strategy`] instead. [`cancelled`](Self::cancelled) handlers fire once,
/// when the signal transitions, whether or not the future ever settles.
///
/// Abort listeners installed by the chain live as long as the chain: dropping
/// the future (which awaiting or spawning it eventually does) detaches them.
///
/// # Example
/// ```
/// use cancelvisor::{CancellableFuture, Controller, Outcome};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let controller = Controller::new();
/// let fut = CancellableFuture::new(async { Ok::<_, ()>(20) }, &controller.signal())
///     .then(|v| async move { Ok(v + 22) });
///
/// assert_eq!(fut.await, Outcome::Value(42));
/// # }
/// ```
#[must_use = "futures do nothing unless polled"]
pub struct CancellableFuture<T, E> {
    signal: Signal,
    strategy: Strategy,
    inner: BoxFuture<'static, Outcome<T, E>>,
    links: AbortLinks,
}

/// Abort listeners owned by a future chain.
#[derive(Default)]
struct AbortLinks(Vec<Listener<CancelReason>>);

impl Drop for AbortLinks {
    fn drop(&mut self) {
        for listener in self.0.drain(..) {
            listener.detach();
        }
    }
}

impl<T, E> CancellableFuture<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Wraps `future` with the default strategy ([`Strategy::Reject`]).
    pub fn new<F>(future: F, signal: &Signal) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::with_options(future, signal, WrapOptions::default())
    }

    /// Wraps `future` with an explicit strategy.
    pub fn with_strategy<F>(future: F, signal: &Signal, strategy: Strategy) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::with_options(future, signal, WrapOptions::new(strategy))
    }

    /// Wraps `future` with full [`WrapOptions`].
    pub fn with_options<F>(future: F, signal: &Signal, options: WrapOptions<T, E>) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self {
            signal: signal.clone(),
            strategy: options.strategy,
            inner: signal.wrap_future(future, options),
            links: AbortLinks::default(),
        }
    }

    /// Runs `producer` now, unless `signal` is already cancelled, and settles
    /// with whatever it passes to the [`Resolver`].
    ///
    /// The producer also receives the signal so long-running work can check it.
    pub fn from_producer<P>(signal: &Signal, strategy: Strategy, producer: P) -> Self
    where
        P: FnOnce(Resolver<T, E>, Signal),
    {
        let (tx, rx) = oneshot::channel();
        let run = signal.wrap_function(
            move |(resolver, signal): (Resolver<T, E>, Signal)| {
                producer(resolver, signal);
                async move {
                    match rx.await {
                        Ok(result) => result,
                        Err(_dropped) => futures::future::pending().await,
                    }
                }
            },
            WrapOptions::new(strategy),
        );
        Self {
            signal: signal.clone(),
            strategy,
            inner: run((Resolver::new(tx), signal.clone())),
            links: AbortLinks::default(),
        }
    }

    /// Signal gating this future.
    pub fn signal(&self) -> &Signal {
        &self.signal
    }

    /// Strategy applied when cancellation wins.
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Returns `true` once the gating signal is cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.signal.is_cancelled()
    }

    /// Chains a fulfillment continuation, skipped after cancellation.
    pub fn then<U, F, Fut>(self, f: F) -> CancellableFuture<U, E>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<U, E>> + Send + 'static,
    {
        let Self {
            signal,
            strategy,
            inner,
            links,
        } = self;
        let gate = signal.clone();
        let next = async move {
            match inner.await.split() {
                Ok(value) => gate.wrap_function(f, WrapOptions::new(strategy))(value).await,
                Err(rest) => rest.widen(),
            }
        };
        CancellableFuture {
            signal,
            strategy,
            inner: next.boxed(),
            links,
        }
    }

    /// Maps the fulfillment value synchronously, skipped after cancellation.
    pub fn map<U, F>(self, f: F) -> CancellableFuture<U, E>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.then(move |v| futures::future::ready(Ok(f(v))))
    }

    /// Chains a rejection continuation, skipped after cancellation.
    pub fn catch<E2, F, Fut>(self, f: F) -> CancellableFuture<T, E2>
    where
        E2: Send + 'static,
        F: FnOnce(E) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E2>> + Send + 'static,
    {
        let Self {
            signal,
            strategy,
            inner,
            links,
        } = self;
        let gate = signal.clone();
        let next = async move {
            match inner.await {
                Outcome::Value(v) => Outcome::Value(v),
                Outcome::Error(e) => gate.wrap_function(f, WrapOptions::new(strategy))(e).await,
                Outcome::Dismissed => Outcome::Dismissed,
                Outcome::Aborted(r) => Outcome::Aborted(r),
            }
        };
        CancellableFuture {
            signal,
            strategy,
            inner: next.boxed(),
            links,
        }
    }

    /// Runs `f` after settlement, skipped after cancellation.
    pub fn finally<F>(self, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let Self {
            signal,
            strategy,
            inner,
            links,
        } = self;
        let gate = signal.clone();
        let next = async move {
            let out = inner.await;
            if out.is_cancelled() {
                return out;
            }
            match gate.reason() {
                Some(reason) => settle_cancelled(reason, WrapOptions::new(strategy)).await,
                None => {
                    f();
                    out
                }
            }
        };
        CancellableFuture {
            signal,
            strategy,
            inner: next.boxed(),
            links,
        }
    }

    /// Registers `handler` to run once when the signal is cancelled.
    ///
    /// Runs immediately if the signal is already cancelled. Does not wait for,
    /// or depend on, the inner future. The listener is detached when the
    /// chain is dropped.
    pub fn cancelled<F>(mut self, handler: F) -> Self
    where
        F: FnOnce(CancelReason) + Send + 'static,
    {
        let slot = Arc::new(Mutex::new(Some(handler)));
        let pending = Arc::clone(&slot);
        let listener = self.signal.on_abort_once(move |reason| {
            if let Some(h) = lock(&pending).take() {
                h(reason.clone());
            }
        });
        if let Some(reason) = self.signal.reason() {
            listener.detach();
            if let Some(h) = lock(&slot).take() {
                h(reason);
            }
            return self;
        }
        self.links.0.push(listener);
        self
    }

    /// Drives the future on the Tokio runtime without awaiting it.
    pub fn spawn(self) -> JoinHandle<Outcome<T, E>> {
        tokio::spawn(self)
    }
}

impl Signal {
    /// Gates `future` by this signal.
    ///
    /// A future already gated by this same signal is returned unchanged
    /// instead of being raced a second time.
    pub fn adopt<T, E>(&self, mut future: CancellableFuture<T, E>) -> CancellableFuture<T, E>
    where
        T: Send + 'static,
        E: Send + 'static,
    {
        if future.signal.is_same(self) {
            return future;
        }
        let strategy = future.strategy;
        let links = std::mem::take(&mut future.links);
        CancellableFuture {
            signal: self.clone(),
            strategy,
            inner: self.wrap_outcome(future, WrapOptions::new(strategy)),
            links,
        }
    }
}

impl<T, E> Future for CancellableFuture<T, E> {
    type Output = Outcome<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl<T, E> fmt::Debug for CancellableFuture<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellableFuture")
            .field("signal", &self.signal)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Controller;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    fn slow(value: u32) -> impl Future<Output = Result<u32, String>> + Send + 'static {
        async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(value)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_continuation_after_cancel() {
        let c = Controller::new();
        let ran = Arc::new(AtomicBool::new(false));
        let cancelled = Arc::new(AtomicUsize::new(0));

        let r1 = ran.clone();
        let r2 = ran.clone();
        let n = cancelled.clone();
        let fut = CancellableFuture::new(slow(1), &c.signal())
            .then(move |v| {
                r1.store(true, Ordering::SeqCst);
                async move { Ok(v) }
            })
            .catch(move |e: String| {
                r2.store(true, Ordering::SeqCst);
                async move { Err::<u32, String>(e) }
            })
            .cancelled(move |_| {
                n.fetch_add(1, Ordering::SeqCst);
            });

        let handle = fut.spawn();
        tokio::time::sleep(Duration::from_secs(1)).await;
        c.cancel_with("stop");
        c.cancel_with("again");

        assert_eq!(handle.await.unwrap(), Outcome::Aborted("stop".into()));
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_producer_scenario_cancelled_before_delay() {
        let c = Controller::new();
        let then_ran = Arc::new(AtomicBool::new(false));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let p = CancellableFuture::from_producer(&c.signal(), Strategy::Reject, |resolver, _signal| {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                resolver.resolve(42);
            });
        });
        let t = then_ran.clone();
        let s = seen.clone();
        let p = p
            .then(move |v: u32| {
                t.store(true, Ordering::SeqCst);
                async move { Ok::<u32, ()>(v) }
            })
            .cancelled(move |reason| s.lock().unwrap().push(reason));

        let handle = p.spawn();
        tokio::time::sleep(Duration::from_millis(10)).await;
        c.cancel_with("x");
        let out = handle.await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(out.is_cancelled());
        assert!(!then_ran.load(Ordering::SeqCst));
        assert_eq!(*seen.lock().unwrap(), vec![CancelReason::from("x")]);
    }

    #[tokio::test]
    async fn test_producer_never_runs_when_already_cancelled() {
        let c = Controller::new();
        c.cancel();
        let ran = Arc::new(AtomicBool::new(false));
        let r = ran.clone();
        let p = CancellableFuture::<u8, ()>::from_producer(&c.signal(), Strategy::Resolve, move |res, _| {
            r.store(true, Ordering::SeqCst);
            res.resolve(1);
        });
        assert_eq!(p.await, Outcome::Dismissed);
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_producer_rejection_reaches_catch() {
        let c = Controller::new();
        let p = CancellableFuture::<u8, String>::from_producer(&c.signal(), Strategy::Reject, |res, _| {
            res.reject("bad".to_string());
        })
        .catch(|e| async move { Ok::<u8, ()>(e.len() as u8) });
        assert_eq!(p.await, Outcome::Value(3));
    }

    #[tokio::test]
    async fn test_then_and_map_chain_values() {
        let c = Controller::new();
        let out = CancellableFuture::new(async { Ok::<u32, ()>(2) }, &c.signal())
            .then(|v| async move { Ok(v * 10) })
            .map(|v| v + 1)
            .await;
        assert_eq!(out, Outcome::Value(21));
    }

    #[tokio::test]
    async fn test_finally_runs_on_settlement_but_not_after_cancel() {
        let c = Controller::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let out = CancellableFuture::new(async { Err::<u8, &str>("e") }, &c.signal())
            .finally(move || {
                h.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        assert_eq!(out, Outcome::Error("e"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let c = Controller::new();
        let canceller = Arc::new(c);
        let cc = canceller.clone();
        let h = hits.clone();
        let out = CancellableFuture::with_strategy(async { Ok::<u8, &str>(1) }, &canceller.signal(), Strategy::Resolve)
            .map(move |v| {
                cc.cancel();
                v
            })
            .finally(move || {
                h.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        assert_eq!(out, Outcome::Dismissed);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_handler_fires_immediately_when_already_cancelled() {
        let c = Controller::new();
        c.cancel_with("late");
        let seen = Arc::new(Mutex::new(None));
        let s = seen.clone();
        let _fut = CancellableFuture::new(async { Ok::<u8, ()>(1) }, &c.signal())
            .cancelled(move |r| *s.lock().unwrap() = Some(r));
        assert_eq!(seen.lock().unwrap().as_ref().unwrap(), "late");
        assert_eq!(c.signal().listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_adopt_keeps_same_signal_and_races_foreign_one() {
        let a = Controller::new();
        let b = Controller::new();

        let fut = CancellableFuture::new(slow(1), &a.signal());
        let same = a.signal().adopt(fut);
        assert!(same.signal().is_same(&a.signal()));

        let foreign = b.signal().adopt(same);
        assert!(foreign.signal().is_same(&b.signal()));
        let handle = foreign.spawn();
        tokio::task::yield_now().await;
        b.cancel_with("b");
        assert_eq!(handle.await.unwrap(), Outcome::Aborted("b".into()));
    }

    #[tokio::test]
    async fn test_settled_chains_release_their_abort_listeners() {
        let c = Controller::new();
        for i in 0..100u32 {
            let out = CancellableFuture::new(async move { Ok::<u32, ()>(i) }, &c.signal())
                .cancelled(|_| {})
                .map(|v| v + 1)
                .cancelled(|_| {})
                .await;
            assert_eq!(out, Outcome::Value(i + 1));
        }
        assert_eq!(c.signal().listener_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_chain_releases_abort_listener() {
        let c = Controller::new();
        let fired = Arc::new(AtomicBool::new(false));
        let f = fired.clone();
        let fut = CancellableFuture::new(slow(1), &c.signal())
            .cancelled(move |_| f.store(true, Ordering::SeqCst));
        assert_eq!(c.signal().listener_count(), 1);

        drop(fut);
        assert_eq!(c.signal().listener_count(), 0);
        c.cancel();
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_adopted_chain_keeps_its_abort_listener() {
        let a = Controller::new();
        let b = Controller::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let fut = CancellableFuture::new(slow(1), &a.signal()).cancelled(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        let adopted = b.signal().adopt(fut);
        let handle = adopted.spawn();
        tokio::task::yield_now().await;

        a.cancel_with("a");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(handle.await.unwrap().is_cancelled());
        assert_eq!(a.signal().listener_count(), 0);
    }
}
