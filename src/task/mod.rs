//! # Task state machine and composition.
//!
//! A [`Task`] is an observable unit of work with a caller side (control
//! methods) and an executor side ([`TaskContext`]).
//!
//! ```text
//!   caller ── start / pause / resume / abort ──► Task ◄── next / progress / complete / error ── TaskContext
//!                                                  │
//!                                                  ▼
//!                       NotificationChannel<TaskEvent>  ("start", "next", "abort", ...)
//! ```
//!
//! ## Contents
//! - [`Task`], [`TaskOptions`], [`TaskContext`]
//! - [`TaskState`], [`TaskEvent`], [`TaskEventKind`]
//! - [`Progress`], [`ProgressMode`]
//! - [`tasks_in_sequence`], [`tasks_in_parallel`], [`TaskContext::forward`]

mod compose;
mod context;
mod event;
mod progress;
mod state;
#[allow(clippy::module_inception)]
mod task;

pub use compose::{tasks_in_parallel, tasks_in_sequence, SIBLING_FAILED};
pub use context::TaskContext;
pub use event::{TaskEvent, TaskEventKind};
pub use progress::{Progress, ProgressMode};
pub use state::TaskState;
pub use task::{Task, TaskOptions};
