use std::fmt;

/// Lifecycle state of a [`Task`](super::Task).
///
/// ```text
///  Await ──start──► Run ◄──resume── Pause
///    │               │ ──pause──────► │
///    │               ├─complete─► Complete
///    │               ├─error────► Error
///    └──abort────────┴─abort──────────┴──► Abort
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Created, not started yet.
    Await,
    /// Running; the executor may emit values and progress.
    Run,
    /// Suspended by the caller.
    Pause,
    /// Cancelled with a reason.
    Abort,
    /// Finished with its last value.
    Complete,
    /// Failed with an error.
    Error,
}

impl TaskState {
    /// Returns a short stable label for use in logs and notification names.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Await => "await",
            TaskState::Run => "run",
            TaskState::Pause => "pause",
            TaskState::Abort => "abort",
            TaskState::Complete => "complete",
            TaskState::Error => "error",
        }
    }

    /// Returns `true` for `Complete`, `Error` and `Abort`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Complete | TaskState::Error | TaskState::Abort)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
