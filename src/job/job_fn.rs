//! # Function-backed job (`JobFn`)
//!
//! [`JobFn`] wraps a closure `F: Fn(Signal) -> Fut`, producing a fresh future
//! per run. No state is shared between runs unless the closure captures an
//! `Arc<...>` explicitly.
//!
//! ## Example
//! ```rust
//! use cancelvisor::{JobFn, Signal};
//!
//! let job = JobFn::arc("double", |_signal: Signal| async { Ok::<u32, ()>(21 * 2) });
//! assert_eq!(job.name(), "double");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::signal::Signal;

use super::Job;

/// Function-backed job implementation.
#[derive(Debug)]
pub struct JobFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> JobFn<F> {
    /// Creates a new function-backed job.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self { name: name.into(), f }
    }

    /// Creates the job behind an `Arc`, as taken by
    /// [`Task::from_job`](crate::Task::from_job) and
    /// [`OperationRegistry::register_job`](crate::OperationRegistry::register_job).
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }

    /// Returns the job name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl<F, Fut, T, E> Job<T, E> for JobFn<F>
where
    F: Fn(Signal) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, signal: Signal) -> Result<T, E> {
        (self.f)(signal).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Controller;

    #[tokio::test]
    async fn test_each_run_gets_the_signal() {
        let job = JobFn::arc("probe", |signal: Signal| async move {
            Ok::<bool, ()>(signal.is_cancelled())
        });
        let c = Controller::new();
        assert_eq!(Job::<bool, ()>::run(&*job, c.signal()).await, Ok(false));
        c.cancel();
        assert_eq!(Job::<bool, ()>::run(&*job, c.signal()).await, Ok(true));
    }
}
