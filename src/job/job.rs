//! # Job abstraction.
//!
//! A [`Job`] is an async unit of work that receives a [`Signal`] and should
//! check it (or wrap its inner futures with it) so it can stop cooperatively
//! once cancelled.

use async_trait::async_trait;

use crate::signal::Signal;

/// # Asynchronous, cancellable unit of work.
///
/// A `Job` has a stable [`name`](Job::name) and an async [`run`](Job::run)
/// method that receives the [`Signal`] of its cancellation scope.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use cancelvisor::{Job, Signal};
///
/// struct Fetch;
///
/// #[async_trait]
/// impl Job<u32, String> for Fetch {
///     fn name(&self) -> &str { "fetch" }
///
///     async fn run(&self, signal: Signal) -> Result<u32, String> {
///         if signal.is_cancelled() {
///             return Err("gave up".into());
///         }
///         Ok(42)
///     }
/// }
/// ```
#[async_trait]
pub trait Job<T, E>: Send + Sync + 'static
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Returns a stable, human-readable job name.
    fn name(&self) -> &str;

    /// Executes the job until completion or cancellation.
    async fn run(&self, signal: Signal) -> Result<T, E>;
}
