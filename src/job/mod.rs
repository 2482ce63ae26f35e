//! # Job abstractions.
//!
//! - [`Job`] - trait for async cancellable work
//! - [`JobFn`] - closure-backed implementation

#[allow(clippy::module_inception)]
mod job;
mod job_fn;

pub use job::Job;
pub use job_fn::JobFn;
