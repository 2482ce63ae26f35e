//! # Cancellable futures.
//!
//! [`CancellableFuture`] pairs a host future with the [`Signal`](crate::Signal)
//! that gates it. Every continuation chained onto it is gated by the same
//! signal, so one `cancel` stops the whole chain.
//!
//! ```text
//! CancellableFuture::new(fut, &signal)
//!    .then(f)        ── skipped once cancelled
//!    .catch(g)       ── skipped once cancelled
//!    .finally(h)     ── skipped once cancelled
//!    .cancelled(k)   ── runs exactly once, at the abort instant
//! ```
//!
//! [`CancellableFuture::from_producer`] is the eager form: the producer runs
//! at construction (unless already cancelled) and settles through a [`Resolver`].

mod cancellable;
mod resolver;

pub use cancellable::CancellableFuture;
pub use resolver::Resolver;
