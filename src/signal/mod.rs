//! # Cancellation signals and controllers.
//!
//! A [`Controller`] is the sole writer of one [`Signal`]. The signal is a
//! bistable flag built on a [`NotificationChannel`](crate::NotificationChannel)
//! that dispatches a single [`ABORT`] notification at the transition instant.
//!
//! ## Fan-out
//! ```text
//! Controller::cancel(reason)
//!      │  (no-op when already cancelled)
//!      ▼
//!   Signal ── abort(reason) ──┬──► CancellableFuture races   ─► Dismissed / Aborted / pending
//!                             ├──► Task abort links          ─► Task::abort(reason)
//!                             ├──► merged controllers         ─► cancel + detach other sources
//!                             └──► external CancellationToken ─► token.cancel()
//! ```
//!
//! ## Contents
//! - [`Signal`], [`Controller`], [`CancelReason`]
//! - [`Strategy`], [`Outcome`] settlement shapes
//! - [`WrapOptions`] and the `wrap_future` / `wrap_function` races
//! - [`delay`], [`race_timeout`], [`Controller::cancel_after`] timers

mod controller;
mod outcome;
mod reason;
#[allow(clippy::module_inception)]
mod signal;
mod timeout;
mod wrap;

pub use controller::Controller;
pub use outcome::{Outcome, Strategy};
pub use reason::CancelReason;
pub use signal::{Cancelled, Signal, ABORT};
pub use timeout::{delay, race_timeout};
pub use wrap::{OnCancelled, WrapOptions};

pub(crate) use wrap::settle_cancelled;
