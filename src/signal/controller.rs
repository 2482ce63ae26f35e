use std::fmt;

use tokio_util::sync::CancellationToken;

use super::{CancelReason, Signal};

/// Sole writer of one [`Signal`].
///
/// `cancel` is idempotent: the first call fixes the reason, later calls are no-ops.
///
/// # Example
/// ```
/// use cancelvisor::Controller;
///
/// let controller = Controller::new();
/// let signal = controller.signal();
///
/// assert!(controller.cancel_with("first"));
/// assert!(!controller.cancel_with("second"));
/// assert_eq!(signal.reason().unwrap(), "first");
/// ```
pub struct Controller {
    signal: Signal,
}

impl Controller {
    /// Creates a controller with a fresh, unset signal.
    pub fn new() -> Self {
        Self {
            signal: Signal::new(),
        }
    }

    /// Returns a handle to the controlled signal.
    pub fn signal(&self) -> Signal {
        self.signal.clone()
    }

    /// Returns `true` once the signal is cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.signal.is_cancelled()
    }

    /// Cancels with the default reason. Returns `false` if already cancelled.
    pub fn cancel(&self) -> bool {
        self.signal.cancel(CancelReason::default())
    }

    /// Cancels with `reason`. Returns `false` if already cancelled.
    pub fn cancel_with(&self, reason: impl Into<CancelReason>) -> bool {
        self.signal.cancel(reason.into())
    }

    /// Creates a controller cancelled by whichever of `signals` cancels first.
    ///
    /// - If a source is already cancelled, the new controller is cancelled
    ///   synchronously with that source's reason and no source is subscribed.
    /// - Otherwise one abort listener is attached per source. The first source
    ///   to fire cancels the merged signal, which immediately detaches the
    ///   listeners left on the other sources.
    pub fn from_signals(signals: &[Signal]) -> Self {
        let controller = Controller::new();
        if let Some(reason) = signals.iter().find_map(Signal::reason) {
            controller.signal.cancel(reason);
            return controller;
        }

        let derived = controller.signal.clone();
        let own = derived.downgrade();
        derived.on_abort_once(move |_| {
            if let Some(signal) = own.upgrade() {
                signal.release_links();
            }
        });

        let links = signals
            .iter()
            .map(|source| {
                let target = derived.downgrade();
                source.on_abort_once(move |reason| {
                    if let Some(signal) = target.upgrade() {
                        signal.cancel(reason.clone());
                    }
                })
            })
            .collect();
        derived.hold_links(links);

        // a source may have fired between the first check and the subscriptions
        if let Some(reason) = signals.iter().find_map(Signal::reason) {
            derived.cancel(reason);
        }
        controller
    }

    /// Cancels this controller when `token` is cancelled.
    ///
    /// Binds an external collaborator (a transport, a worker pool) that reports
    /// failure through a [`CancellationToken`]. The watcher task ends as soon as
    /// either side is cancelled. Must be called within a Tokio runtime unless
    /// `token` is already cancelled.
    pub fn link_with_external_abort(&self, token: CancellationToken) {
        if token.is_cancelled() {
            self.signal.cancel(CancelReason::new("External abort"));
            return;
        }
        let signal = self.signal.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    signal.cancel(CancelReason::new("External abort"));
                }
                _ = signal.cancelled() => {}
            }
        });
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("signal", &self.signal)
            .finish()
    }
}
