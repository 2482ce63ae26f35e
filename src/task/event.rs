use crate::signal::CancelReason;

use super::Progress;

/// Name of a task notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskEventKind {
    /// `await → run`.
    Start,
    /// `run → pause`.
    Pause,
    /// `pause → run`.
    Resume,
    /// The executor emitted a value.
    Next,
    /// The executor reported progress.
    Progress,
    /// `run → complete`.
    Complete,
    /// `run → error`.
    Error,
    /// `await | run | pause → abort`.
    Abort,
}

impl TaskEventKind {
    /// Notification name on the task's channel.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskEventKind::Start => "start",
            TaskEventKind::Pause => "pause",
            TaskEventKind::Resume => "resume",
            TaskEventKind::Next => "next",
            TaskEventKind::Progress => "progress",
            TaskEventKind::Complete => "complete",
            TaskEventKind::Error => "error",
            TaskEventKind::Abort => "abort",
        }
    }
}

/// Payload of a task notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskEvent<T, E> {
    /// See [`TaskEventKind::Start`].
    Start,
    /// See [`TaskEventKind::Pause`].
    Pause,
    /// See [`TaskEventKind::Resume`].
    Resume,
    /// Emitted value.
    Next(T),
    /// Reported progress.
    Progress(Progress),
    /// Last emitted value, if any.
    Complete(Option<T>),
    /// Failure.
    Error(E),
    /// Cancellation reason.
    Abort(CancelReason),
}

impl<T, E> TaskEvent<T, E> {
    /// Kind of this event.
    pub fn kind(&self) -> TaskEventKind {
        match self {
            TaskEvent::Start => TaskEventKind::Start,
            TaskEvent::Pause => TaskEventKind::Pause,
            TaskEvent::Resume => TaskEventKind::Resume,
            TaskEvent::Next(_) => TaskEventKind::Next,
            TaskEvent::Progress(_) => TaskEventKind::Progress,
            TaskEvent::Complete(_) => TaskEventKind::Complete,
            TaskEvent::Error(_) => TaskEventKind::Error,
            TaskEvent::Abort(_) => TaskEventKind::Abort,
        }
    }
}
