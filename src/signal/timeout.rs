//! # Timers layered on the cancellation fan-out.
//!
//! There is no separate timeout mechanism: a timer either races a signal
//! ([`delay`]) or cancels the primary operation's controller when it wins
//! ([`race_timeout`], [`Controller::cancel_after`]). Every derived future and
//! task then stops through the usual abort notification.

use std::convert::Infallible;
use std::future::Future;
use std::pin::pin;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::future::CancellableFuture;

use super::{CancelReason, Controller, Outcome, Signal, Strategy};

/// Sleeps for `duration` unless `signal` is cancelled first.
///
/// Settles with `Value(())` when the timer elapses, `Aborted(reason)` otherwise.
pub fn delay(duration: Duration, signal: &Signal) -> CancellableFuture<(), Infallible> {
    CancellableFuture::with_strategy(
        async move {
            tokio::time::sleep(duration).await;
            Ok(())
        },
        signal,
        Strategy::Reject,
    )
}

/// Awaits `operation`; if `duration` elapses first, cancels `controller` with
/// [`CancelReason::timeout`] and returns the outcome the operation settles with.
///
/// With [`Strategy::Never`] on the operation this never returns once the timer wins.
pub async fn race_timeout<T, E, F>(
    controller: &Controller,
    duration: Duration,
    operation: F,
) -> Outcome<T, E>
where
    F: Future<Output = Outcome<T, E>>,
{
    let mut operation = pin!(operation);
    tokio::select! {
        biased;
        out = &mut operation => return out,
        _ = tokio::time::sleep(duration) => {
            tracing::debug!(?duration, "timer won the race; cancelling primary operation");
            controller.cancel_with(CancelReason::timeout());
        }
    }
    operation.await
}

impl Controller {
    /// Cancels this controller with [`CancelReason::timeout`] after `duration`.
    ///
    /// The timer task ends early if the controller is cancelled some other way.
    pub fn cancel_after(&self, duration: Duration) -> JoinHandle<()> {
        let signal = self.signal();
        tokio::spawn(async move {
            tokio::select! {
                _ = signal.cancelled() => {}
                _ = tokio::time::sleep(duration) => {
                    signal.cancel(CancelReason::timeout());
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_delay_elapses_or_aborts() {
        let c = Controller::new();
        assert_eq!(delay(Duration::from_millis(10), &c.signal()).await, Outcome::Value(()));

        let fut = delay(Duration::from_secs(10), &c.signal());
        c.cancel_with("stop");
        assert_eq!(fut.await, Outcome::Aborted("stop".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_race_timeout_cancels_primary_controller() {
        let c = Controller::new();
        let op = CancellableFuture::new(
            async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<u8, ()>(1)
            },
            &c.signal(),
        );
        let out = race_timeout(&c, Duration::from_secs(1), op).await;
        assert_eq!(out, Outcome::Aborted(CancelReason::timeout()));
        assert!(c.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_race_timeout_passes_through_fast_operation() {
        let c = Controller::new();
        let op = CancellableFuture::new(async { Ok::<u8, ()>(7) }, &c.signal());
        let out = race_timeout(&c, Duration::from_secs(1), op).await;
        assert_eq!(out, Outcome::Value(7));
        assert!(!c.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_fires_timeout_reason() {
        let c = Controller::new();
        let timer = c.cancel_after(Duration::from_secs(2));
        let reason = c.signal().cancelled().await;
        timer.await.unwrap();
        assert_eq!(reason, "Timeout");
    }
}
