//! # Pub/sub kernel
//!
//! The kernel is a bidirectional link between one [`Emitter`] and many
//! [`Subscriber`]s. Everything else in the crate (named channels, signals,
//! tasks) is built on it.
//!
//! ## Architecture
//! ```text
//!   emit(v) ──► [pending FIFO] ──► drain (single drainer)
//!                                     │  snapshot of subscribers
//!                                     ├──► S1.callback(&v)   (if active + attached)
//!                                     ├──► S2.callback(&v)
//!                                     └──► SN.callback(&v)
//!
//!   attach: 0 → 1 subscribers ──► on_first_attach hook
//!   detach: 1 → 0 subscribers ──► on_last_detach hook
//! ```
//!
//! ## Rules
//! - Delivery is synchronous; no lock is held while a callback runs.
//! - A subscriber detached or deactivated mid-delivery receives nothing more.
//! - `emit` from inside a callback is queued behind the current value (FIFO per emitter).
//! - `emit` from another thread while a drain runs is delivered by that drain;
//!   the call may return before delivery.
//! - A subscriber belongs to at most one emitter; attaching elsewhere moves it.

mod emitter;
mod subscriber;

pub use emitter::Emitter;
pub use subscriber::Subscriber;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks a mutex, recovering the guard if a callback panicked while it was held.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
