use std::fmt;
use std::sync::{Arc, Mutex};

use crate::error::TransitionError;
use crate::kernel::lock;
use crate::notify::Listener;
use crate::signal::Signal;

use super::{Progress, Task, TaskEvent, TaskEventKind, TaskState};

type Deferred<T, E> = Box<dyn FnOnce(&Task<T, E>) + Send>;

/// Write side of a [`Task`], handed once to its executor.
///
/// Plain methods require the task to be in `Run`. The `*_until_run` variants
/// defer the call until the task next enters `Run` (through `start` or
/// `resume`), which lets an executor record intent before the caller starts it.
pub struct TaskContext<T, E> {
    task: Task<T, E>,
}

impl<T, E> TaskContext<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub(super) fn new(task: Task<T, E>) -> Self {
        Self { task }
    }

    /// The task this context writes to.
    pub fn task(&self) -> &Task<T, E> {
        &self.task
    }

    /// Current state of the task.
    pub fn state(&self) -> TaskState {
        self.task.state()
    }

    /// Signal cancelled when the task aborts; wrap executor work with it.
    pub fn signal(&self) -> Signal {
        self.task.signal()
    }

    /// Emits `value`. Legal only in `Run`.
    pub fn next(&self, value: T) -> Result<(), TransitionError> {
        self.task.next(value)
    }

    /// Reports progress. Legal only in `Run`.
    pub fn progress(&self, progress: Progress) -> Result<(), TransitionError> {
        self.task.report(progress)
    }

    /// `run → complete` with the last emitted value.
    pub fn complete(&self) -> Result<(), TransitionError> {
        self.task.complete()
    }

    /// `run → error`.
    pub fn error(&self, error: E) -> Result<(), TransitionError> {
        self.task.fail(error)
    }

    /// [`next`](Self::next), now if running, otherwise once the task runs.
    pub fn next_until_run(&self, value: T) -> Result<(), TransitionError> {
        self.defer_until_run("next", move |task| {
            log_deferred(task.next(value));
        })
    }

    /// [`progress`](Self::progress), now if running, otherwise once the task runs.
    pub fn progress_until_run(&self, progress: Progress) -> Result<(), TransitionError> {
        self.defer_until_run("progress", move |task| {
            log_deferred(task.report(progress));
        })
    }

    /// [`complete`](Self::complete), now if running, otherwise once the task runs.
    pub fn complete_until_run(&self) -> Result<(), TransitionError> {
        self.defer_until_run("complete", |task| {
            log_deferred(task.complete());
        })
    }

    /// [`error`](Self::error), now if running, otherwise once the task runs.
    pub fn error_until_run(&self, error: E) -> Result<(), TransitionError> {
        self.defer_until_run("error", move |task| {
            log_deferred(task.fail(error));
        })
    }

    /// Runs `action` now if the task is running, otherwise on the next
    /// `start` or `resume`. Fails if the task is already done.
    pub(crate) fn defer_until_run<F>(&self, op: &'static str, action: F) -> Result<(), TransitionError>
    where
        F: FnOnce(&Task<T, E>) + Send + 'static,
    {
        match self.task.state() {
            TaskState::Run => {
                action(&self.task);
                return Ok(());
            }
            state if state.is_terminal() => return Err(TransitionError::illegal(op, state)),
            _ => {}
        }

        let action: Deferred<T, E> = Box::new(action);
        let pending = Arc::new(Mutex::new(Some(action)));
        let peers: Arc<Mutex<Vec<Listener<TaskEvent<T, E>>>>> = Arc::new(Mutex::new(Vec::new()));

        for kind in [TaskEventKind::Start, TaskEventKind::Resume] {
            let pending = Arc::clone(&pending);
            let others = Arc::clone(&peers);
            let weak = self.task.downgrade();
            let listener = self.task.once(kind, move |_| {
                for peer in lock(&others).drain(..) {
                    peer.detach();
                }
                let action = lock(&pending).take();
                if let (Some(action), Some(task)) = (action, weak.upgrade()) {
                    action(&task);
                }
            });
            lock(&peers).push(listener);
        }

        // the task may have started while the listeners were being attached
        if self.task.state() == TaskState::Run {
            if let Some(action) = lock(&pending).take() {
                detach_all(&peers);
                action(&self.task);
            }
        }

        self.task.on_teardown(Box::new(move || detach_all(&peers)));
        Ok(())
    }
}

fn detach_all<V: Send + Sync + 'static>(listeners: &Mutex<Vec<Listener<V>>>) {
    let drained: Vec<_> = lock(listeners).drain(..).collect();
    for listener in drained {
        listener.detach();
    }
}

fn log_deferred(result: Result<(), TransitionError>) {
    if let Err(e) = result {
        tracing::debug!(label = e.as_label(), error = %e, "deferred task call dropped");
    }
}

impl<T, E> Clone for TaskContext<T, E> {
    fn clone(&self) -> Self {
        Self {
            task: self.task.clone(),
        }
    }
}

impl<T, E> fmt::Debug for TaskContext<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext").field("task", &self.task).finish()
    }
}
