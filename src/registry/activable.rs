//! # Activation lifecycle.
//!
//! A resource that can be switched on and off embeds an [`Activation`] and
//! implements [`Activable`]. The registry turns such a resource into an
//! operation that lives exactly as long as the resource stays active.
//!
//! ## Rules
//! - `activate` and `deactivate` are idempotent; hooks run only on a change.
//! - A failing `on_deactivate` hook is logged and the resource is still
//!   marked inactive.

use std::error::Error;
use std::fmt;

use tokio::sync::watch;

/// Result of an activation hook.
pub type HookResult = Result<(), Box<dyn Error + Send + Sync>>;

/// Active/inactive flag with change notification.
pub struct Activation {
    state: watch::Sender<bool>,
}

impl Activation {
    /// Creates an inactive flag.
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self { state }
    }

    /// Returns `true` while active.
    pub fn is_active(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolves once the flag is (or becomes) inactive.
    pub async fn inactive(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|active| !*active).await;
    }

    /// Receiver observing every change of the flag.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// Sets the flag; returns `true` if it changed.
    fn set(&self, active: bool) -> bool {
        self.state.send_if_modified(|current| {
            if *current == active {
                return false;
            }
            *current = active;
            true
        })
    }
}

impl Default for Activation {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activation")
            .field("active", &self.is_active())
            .finish()
    }
}

/// # Resource with an activation lifecycle.
///
/// Implementors embed an [`Activation`] and may override the hooks; the
/// provided `activate`/`deactivate` keep the flag and hooks consistent.
///
/// # Example
/// ```
/// use cancelvisor::{Activable, Activation};
///
/// #[derive(Default)]
/// struct Poller {
///     activation: Activation,
/// }
///
/// impl Activable for Poller {
///     fn activation(&self) -> &Activation {
///         &self.activation
///     }
/// }
///
/// let p = Poller::default();
/// p.activate();
/// assert!(p.is_active());
/// p.deactivate();
/// assert!(!p.is_active());
/// ```
pub trait Activable: Send + Sync + 'static {
    /// The embedded activation flag.
    fn activation(&self) -> &Activation;

    /// Called after the flag switched on.
    fn on_activate(&self) -> HookResult {
        Ok(())
    }

    /// Called after the flag switched off.
    fn on_deactivate(&self) -> HookResult {
        Ok(())
    }

    /// Returns `true` while active.
    fn is_active(&self) -> bool {
        self.activation().is_active()
    }

    /// Switches on. A failing hook is logged and switches the flag back off.
    fn activate(&self) {
        if !self.activation().set(true) {
            return;
        }
        if let Err(e) = self.on_activate() {
            tracing::error!(error = %e, "activation hook failed");
            self.activation().set(false);
        }
    }

    /// Switches off. The flag is cleared even when the hook fails.
    fn deactivate(&self) {
        if !self.activation().set(false) {
            return;
        }
        if let Err(e) = self.on_deactivate() {
            tracing::error!(error = %e, "deactivation hook failed; resource marked inactive");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Flaky {
        activation: Activation,
        calls: AtomicUsize,
    }

    impl Activable for Flaky {
        fn activation(&self) -> &Activation {
            &self.activation
        }

        fn on_deactivate(&self) -> HookResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err("socket already closed".into())
        }
    }

    #[test]
    fn test_failing_deactivate_still_marks_inactive() {
        let r = Flaky::default();
        r.activate();
        r.activate();
        r.deactivate();
        r.deactivate();
        assert!(!r.is_active());
        assert_eq!(r.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_inactive_resolves_on_change() {
        let r = std::sync::Arc::new(Flaky::default());
        r.activate();
        let waiter = {
            let r = r.clone();
            tokio::spawn(async move { r.activation().inactive().await })
        };
        tokio::task::yield_now().await;
        r.deactivate();
        waiter.await.unwrap();
    }
}
