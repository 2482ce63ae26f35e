//! # Simple logging listener for debugging and demos.
//!
//! [`LogWriter`] writes every notification of a task through `tracing::info!`
//! in a human-readable format.
//!
//! ## Output format
//! ```text
//! [start] task=upload
//! [progress] task=upload loaded=3 total=10
//! [next] task=upload value=Chunk(3)
//! [pause] task=upload
//! [abort] task=upload reason=Replaced
//! [complete] task=upload last=Some(Chunk(9))
//! ```

use std::borrow::Cow;
use std::fmt;

use crate::notify::Listener;
use crate::task::{Task, TaskEvent};

/// Task listener that logs each notification.
///
/// Enabled via the `logging` feature. Not intended for production use;
/// register a custom listener with [`Task::on_any`] for structured logging
/// or metrics.
#[derive(Clone, Debug)]
pub struct LogWriter {
    name: Cow<'static, str>,
}

impl LogWriter {
    /// Creates a writer labelling its lines with `name`.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self { name: name.into() }
    }

    /// Starts logging `task`. Detach the returned listener to stop.
    pub fn attach<T, E>(&self, task: &Task<T, E>) -> Listener<TaskEvent<T, E>>
    where
        T: Clone + fmt::Debug + Send + Sync + 'static,
        E: Clone + fmt::Debug + Send + Sync + 'static,
    {
        let name = self.name.clone();
        task.on_any(move |n| write(&name, n.value()))
    }
}

fn write<T: fmt::Debug, E: fmt::Debug>(task: &str, e: &TaskEvent<T, E>) {
    let kind = e.kind().as_str();
    match e {
        TaskEvent::Start | TaskEvent::Pause | TaskEvent::Resume => {
            tracing::info!("[{kind}] task={task}");
        }
        TaskEvent::Next(value) => {
            tracing::info!("[{kind}] task={task} value={value:?}");
        }
        TaskEvent::Progress(p) => {
            tracing::info!("[{kind}] task={task} loaded={} total={}", p.loaded, p.total);
        }
        TaskEvent::Complete(last) => {
            tracing::info!("[{kind}] task={task} last={last:?}");
        }
        TaskEvent::Error(err) => {
            tracing::info!("[{kind}] task={task} err={err:?}");
        }
        TaskEvent::Abort(reason) => {
            tracing::info!("[{kind}] task={task} reason={reason}");
        }
    }
}
