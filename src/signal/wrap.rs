//! # Racing host futures against a signal.
//!
//! ```text
//! wrap_future(fut, options)
//!   ├─ signal already cancelled ─────────────► on_cancel (fut never polled)
//!   └─ race (cancellation polled first)
//!        ├─ abort wins ──────────────────────► on_cancel
//!        └─ fut settles ─┬─ signal cancelled ─► on_cancel   (cancellation wins ties)
//!                        └─ otherwise ────────► Value / Error
//!
//! on_cancel
//!   ├─ on_cancelled handler ─► handler(reason, controller),
//!   │                          result wrapped against that controller's signal
//!   │                          (the supplied one, or a fresh unlinked one)
//!   └─ no handler ───────────► Strategy (Resolve / Reject / Never)
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use super::{CancelReason, Controller, Outcome, Signal, Strategy};

/// Continuation run instead of the strategy when cancellation wins.
///
/// Receives the reason and the controller of the continuation's scope: the one
/// set with [`WrapOptions::with_controller`], or else a new root controller that
/// is not linked to the cancelled signal.
pub type OnCancelled<T, E> =
    Box<dyn FnOnce(CancelReason, Arc<Controller>) -> BoxFuture<'static, Result<T, E>> + Send>;

/// Options for [`Signal::wrap_future`] and [`Signal::wrap_function`].
pub struct WrapOptions<T, E> {
    /// Settlement used when cancellation wins and no handler is set.
    pub strategy: Strategy,
    /// Continuation run when cancellation wins.
    pub on_cancelled: Option<OnCancelled<T, E>>,
    /// Controller handed to `on_cancelled`. When `None`, a new root controller
    /// is created; it has no link to the signal that was cancelled.
    pub cancelled_controller: Option<Arc<Controller>>,
}

impl<T, E> WrapOptions<T, E> {
    /// Options with the given strategy and no handler.
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            on_cancelled: None,
            cancelled_controller: None,
        }
    }

    /// Sets the cancellation continuation.
    pub fn on_cancelled<F, Fut>(mut self, handler: F) -> Self
    where
        F: FnOnce(CancelReason, Arc<Controller>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.on_cancelled = Some(Box::new(move |reason, controller| {
            handler(reason, controller).boxed()
        }));
        self
    }

    /// Supplies the controller passed to the cancellation continuation.
    pub fn with_controller(mut self, controller: Arc<Controller>) -> Self {
        self.cancelled_controller = Some(controller);
        self
    }
}

impl<T, E> Default for WrapOptions<T, E> {
    fn default() -> Self {
        Self::new(Strategy::default())
    }
}

impl<T, E> fmt::Debug for WrapOptions<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrapOptions")
            .field("strategy", &self.strategy)
            .field("on_cancelled", &self.on_cancelled.is_some())
            .field("cancelled_controller", &self.cancelled_controller.is_some())
            .finish()
    }
}

impl Signal {
    /// Races `future` against this signal.
    ///
    /// If the signal is already cancelled, `future` is never polled.
    pub fn wrap_future<T, E, F>(
        &self,
        future: F,
        options: WrapOptions<T, E>,
    ) -> BoxFuture<'static, Outcome<T, E>>
    where
        T: Send + 'static,
        E: Send + 'static,
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.wrap_outcome(future.map(Outcome::from), options)
    }

    /// Returns a wrapper that skips `f` entirely when the signal is already
    /// cancelled at call time, and otherwise races the future `f` produces.
    pub fn wrap_function<A, T, E, F, Fut>(
        &self,
        f: F,
        options: WrapOptions<T, E>,
    ) -> impl FnOnce(A) -> BoxFuture<'static, Outcome<T, E>>
    where
        T: Send + 'static,
        E: Send + 'static,
        F: FnOnce(A) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let signal = self.clone();
        move |arg| match signal.reason() {
            Some(reason) => settle_cancelled(reason, options),
            None => signal.wrap_future(f(arg), options),
        }
    }

    /// Same race as [`wrap_future`](Self::wrap_future) for a future that
    /// already yields an [`Outcome`].
    pub(crate) fn wrap_outcome<T, E, F>(
        &self,
        future: F,
        options: WrapOptions<T, E>,
    ) -> BoxFuture<'static, Outcome<T, E>>
    where
        T: Send + 'static,
        E: Send + 'static,
        F: Future<Output = Outcome<T, E>> + Send + 'static,
    {
        let signal = self.clone();
        async move {
            if let Some(reason) = signal.reason() {
                return settle_cancelled(reason, options).await;
            }

            let raced = tokio::select! {
                biased;
                reason = signal.cancelled() => Err(reason),
                out = future => Ok(out),
            };

            match raced {
                Ok(out) => match signal.reason() {
                    Some(reason) => settle_cancelled(reason, options).await,
                    None => out,
                },
                Err(reason) => settle_cancelled(reason, options).await,
            }
        }
        .boxed()
    }
}

/// Applies the cancellation branch of `options`.
///
/// Without a supplied controller the continuation runs under
/// `Controller::new()`: cancelling it is up to the handler, which receives it.
pub(crate) fn settle_cancelled<T, E>(
    reason: CancelReason,
    options: WrapOptions<T, E>,
) -> BoxFuture<'static, Outcome<T, E>>
where
    T: Send + 'static,
    E: Send + 'static,
{
    let WrapOptions {
        strategy,
        on_cancelled,
        cancelled_controller,
    } = options;

    match on_cancelled {
        Some(handler) => {
            let controller = cancelled_controller.unwrap_or_else(|| Arc::new(Controller::new()));
            let signal = controller.signal();
            let next = handler(reason, controller);
            signal.wrap_future(next, WrapOptions::new(strategy))
        }
        None => match strategy.settle(reason) {
            Some(outcome) => futures::future::ready(outcome).boxed(),
            None => futures::future::pending().boxed(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_passes_value_through_when_not_cancelled() {
        let c = Controller::new();
        let out = c
            .signal()
            .wrap_future(async { Ok::<_, ()>(5) }, WrapOptions::default())
            .await;
        assert_eq!(out, Outcome::Value(5));
    }

    #[tokio::test]
    async fn test_already_cancelled_never_polls_body() {
        let c = Controller::new();
        c.cancel_with("early");
        let polled = Arc::new(AtomicBool::new(false));
        let p = polled.clone();
        let out = c
            .signal()
            .wrap_future(
                async move {
                    p.store(true, Ordering::SeqCst);
                    Ok::<u8, ()>(1)
                },
                WrapOptions::new(Strategy::Reject),
            )
            .await;
        assert_eq!(out, Outcome::Aborted("early".into()));
        assert!(!polled.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_strategies_shape_the_cancelled_outcome() {
        for (strategy, expected) in [
            (Strategy::Resolve, Some(Outcome::Dismissed)),
            (Strategy::Reject, Some(Outcome::Aborted("stop".into()))),
            (Strategy::Never, None),
        ] {
            let c = Controller::new();
            let fut = c.signal().wrap_future(
                async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok::<u8, ()>(1)
                },
                WrapOptions::new(strategy),
            );
            c.cancel_with("stop");
            let got = tokio::time::timeout(Duration::from_secs(60), fut).await.ok();
            assert_eq!(got, expected, "strategy {strategy:?}");
        }
    }

    #[tokio::test]
    async fn test_cancellation_wins_ties() {
        let c = Controller::new();
        let signal = c.signal();
        let canceller = Arc::new(c);
        let cc = canceller.clone();
        let out = signal
            .wrap_future(
                async move {
                    // settles and cancels in the same poll
                    cc.cancel_with("tie");
                    Ok::<u8, ()>(1)
                },
                WrapOptions::default(),
            )
            .await;
        assert_eq!(out, Outcome::Aborted("tie".into()));
    }

    #[tokio::test]
    async fn test_on_cancelled_runs_under_a_fresh_controller() {
        let c = Controller::new();
        c.cancel_with("first");
        let options = WrapOptions::new(Strategy::Reject).on_cancelled(|reason, controller| async move {
            assert!(!controller.is_cancelled());
            Ok::<String, ()>(format!("recovered from {reason}"))
        });
        let out = c.signal().wrap_future(async { Ok(String::new()) }, options).await;
        assert_eq!(out, Outcome::Value("recovered from first".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_cancelled_continuation_is_itself_cancellable() {
        let c = Controller::new();
        c.cancel();
        let scope = Arc::new(Controller::new());
        let options = WrapOptions::new(Strategy::Reject)
            .with_controller(scope.clone())
            .on_cancelled(|_, _| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<u8, ()>(9)
            });
        let fut = c.signal().wrap_future(async { Ok(0) }, options);
        scope.cancel_with("second");
        assert_eq!(fut.await, Outcome::Aborted("second".into()));
    }

    #[tokio::test]
    async fn test_wrap_function_skips_call_when_cancelled() {
        let c = Controller::new();
        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();
        let wrapped = c.signal().wrap_function(
            move |x: u8| {
                flag.store(true, Ordering::SeqCst);
                async move { Ok::<u8, ()>(x + 1) }
            },
            WrapOptions::new(Strategy::Resolve),
        );
        c.cancel();
        assert_eq!(wrapped(1).await, Outcome::Dismissed);
        assert!(!called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_default_continuation_controller_is_unlinked() {
        let c = Controller::new();
        c.cancel_with("first");
        let source = c.signal();
        let scope = Arc::new(std::sync::Mutex::new(None));
        let keep = scope.clone();
        let options = WrapOptions::new(Strategy::Reject).on_cancelled(move |_, controller| {
            *keep.lock().unwrap() = Some(controller.signal());
            async { Ok::<u8, ()>(1) }
        });

        assert_eq!(source.wrap_future(async { Ok(0) }, options).await, Outcome::Value(1));
        let fresh = scope.lock().unwrap().take().unwrap();
        assert!(!fresh.is_same(&source));
        assert!(!fresh.is_cancelled());
        assert_eq!(source.listener_count(), 0);
    }
}
