//! # cancelvisor
//!
//! **Cancelvisor** is a cooperative cancellation toolkit for async Rust.
//!
//! It provides a synchronous pub/sub kernel, named notification channels,
//! cancellation signals with a single writer, futures whose continuations
//! stop running once cancelled, an observable task state machine and a keyed
//! registry of single-flight operations.
//!
//! ## Architecture
//! ### Overview
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  OperationRegistry (key ─► Operation + Controller)                │
//! └──────┬──────────────────────────────────────────────┬─────────────┘
//!        ▼                                              ▼
//! ┌──────────────────────┐                    ┌──────────────────────┐
//! │  CancellableFuture   │                    │  Task (state machine)│
//! │  then/catch/finally  │                    │  start/pause/abort   │
//! └──────┬───────────────┘                    └──────┬───────────────┘
//!        │ gated by                                  │ owns
//!        ▼                                           ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Controller ──cancel(reason)──► Signal ── "abort" notification    │
//! └──────────────────────────────────┬────────────────────────────────┘
//!                                    ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  NotificationChannel (name ─► bucket Emitter, raw Emitter)        │
//! └──────────────────────────────────┬────────────────────────────────┘
//!                                    ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Kernel: Emitter ◄──attach/detach──► Subscriber (sync FIFO emit)  │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Cancellation
//! ```text
//! Controller::cancel(reason)
//!   ├─► already cancelled? ─► no-op
//!   └─► store reason ─► dispatch "abort" once, synchronously
//!          ├─► racing futures settle per Strategy (Dismissed / Aborted / pending)
//!          ├─► `cancelled` handlers run exactly once
//!          ├─► linked tasks abort, merged controllers cancel and detach
//!          └─► external CancellationToken handles cancel
//! ```
//!
//! Cancellation is cooperative: in-flight work is not interrupted, its
//! continuations are simply never observed.
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                                 |
//! |-------------------|--------------------------------------------------------------|----------------------------------------------------|
//! | **Kernel**        | Synchronous pub/sub with first/last observer hooks.          | [`Emitter`], [`Subscriber`]                        |
//! | **Notifications** | Named multiplexing with raw listeners.                       | [`NotificationChannel`], [`Listener`]              |
//! | **Signals**       | Single-writer cancellation, merging, timers, token bridge.   | [`Controller`], [`Signal`], [`CancelReason`]       |
//! | **Futures**       | Continuations gated by a signal.                             | [`CancellableFuture`], [`Strategy`], [`Outcome`]   |
//! | **Tasks**         | Observable state machine and composition.                    | [`Task`], [`TaskContext`], [`tasks_in_parallel`]   |
//! | **Registry**      | Keyed single-flight operations.                              | [`OperationRegistry`], [`RegisterMode`]            |
//! | **Jobs**          | Async units of work taking a signal.                         | [`Job`], [`JobFn`]                                 |
//! | **Errors**        | Typed errors for transitions, registry and configuration.    | [`TransitionError`], [`RegistryError`], [`ConfigError`] |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use cancelvisor::{CancellableFuture, Controller, Outcome};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let controller = Controller::new();
//!
//!     let lookup = CancellableFuture::new(
//!         async {
//!             tokio::time::sleep(Duration::from_secs(60)).await;
//!             Ok::<_, String>("slow answer")
//!         },
//!         &controller.signal(),
//!     )
//!     .then(|answer| async move { Ok(answer.len()) })
//!     .cancelled(|reason| println!("lookup cancelled: {reason}"));
//!
//!     controller.cancel_with("user navigated away");
//!     assert_eq!(lookup.await, Outcome::Aborted("user navigated away".into()));
//! }
//! ```

mod error;
mod future;
mod job;
mod kernel;
mod notify;
mod registry;
mod signal;
mod task;

#[cfg(feature = "logging")]
mod observers;

// ---- Public re-exports ----

pub use error::{ConfigError, RegistryError, TransitionError};
pub use future::{CancellableFuture, Resolver};
pub use job::{Job, JobFn};
pub use kernel::{Emitter, Subscriber};
pub use notify::{Listener, Notification, NotificationChannel};
pub use registry::{
    Activable, Activation, HookResult, Operation, OperationRegistry, RegisterMode, RegistryConfig,
};
pub use signal::{
    delay, race_timeout, CancelReason, Cancelled, Controller, OnCancelled, Outcome, Signal,
    Strategy, WrapOptions, ABORT,
};
pub use task::{
    tasks_in_parallel, tasks_in_sequence, Progress, ProgressMode, Task, TaskContext, TaskEvent,
    TaskEventKind, TaskOptions, TaskState, SIBLING_FAILED,
};

// Optional: expose a simple built-in log writer (demo/reference).
#[cfg(feature = "logging")]
pub use observers::LogWriter;
