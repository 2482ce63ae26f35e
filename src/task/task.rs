use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::oneshot;

use crate::error::TransitionError;
use crate::future::CancellableFuture;
use crate::job::Job;
use crate::kernel::lock;
use crate::notify::{Listener, Notification, NotificationChannel};
use crate::signal::{CancelReason, Controller, Outcome, Signal};

use super::{Progress, TaskContext, TaskEvent, TaskEventKind, TaskState};

pub(crate) type Teardown = Box<dyn FnOnce() + Send>;

/// Construction options for [`Task`].
#[derive(Clone, Debug, Default)]
pub struct TaskOptions {
    /// External signal that aborts the task (if not done yet) when cancelled.
    pub signal: Option<Signal>,
}

/// # Observable, controllable unit of work.
///
/// A task is created in [`TaskState::Await`]. The caller drives it with
/// [`start`](Self::start), [`pause`](Self::pause), [`resume`](Self::resume)
/// and [`abort`](Self::abort); the executor passed at construction is the only
/// writer of values, progress and the final result, through its
/// [`TaskContext`].
///
/// Each transition dispatches one notification (see [`TaskEventKind`]).
/// Every internal link (external signal, forwarding, deferred calls) is torn
/// down right after the terminal notification has been delivered.
///
/// Cloning yields another handle to the **same** task.
///
/// ## Rules
/// - Calling a control method from an illegal state returns [`TransitionError`].
/// - `next`, `progress`, `complete` and `error` are legal only in `Run`.
/// - `abort` cancels the task's own [`Signal`], stopping work wrapped with it.
pub struct Task<T, E> {
    inner: Arc<TaskInner<T, E>>,
}

pub(crate) struct TaskInner<T, E> {
    slot: Mutex<Slot<T, E>>,
    channel: NotificationChannel<TaskEvent<T, E>>,
    controller: Controller,
    teardown: Mutex<Option<Vec<Teardown>>>,
}

struct Slot<T, E> {
    state: TaskState,
    last: Option<T>,
    progress: Option<Progress>,
    error: Option<E>,
    reason: Option<CancelReason>,
}

impl<T, E> Task<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Creates a task and runs `executor` once, synchronously.
    pub fn new<F>(executor: F) -> Self
    where
        F: FnOnce(TaskContext<T, E>),
    {
        Self::with_options(TaskOptions::default(), executor)
    }

    /// Creates a task with options and runs `executor` once, synchronously.
    ///
    /// If the external signal is already cancelled, the task is aborted with
    /// its reason and `executor` is never called.
    pub fn with_options<F>(options: TaskOptions, executor: F) -> Self
    where
        F: FnOnce(TaskContext<T, E>),
    {
        let task = Self {
            inner: Arc::new(TaskInner {
                slot: Mutex::new(Slot {
                    state: TaskState::Await,
                    last: None,
                    progress: None,
                    error: None,
                    reason: None,
                }),
                channel: NotificationChannel::new(),
                controller: Controller::new(),
                teardown: Mutex::new(Some(Vec::new())),
            }),
        };

        if let Some(external) = options.signal {
            if let Some(reason) = external.reason() {
                let _ = task.abort(reason);
                return task;
            }
            let weak = task.downgrade();
            let link = external.on_abort_once(move |reason| {
                if let Some(task) = weak.upgrade() {
                    let _ = task.abort(reason.clone());
                }
            });
            task.on_teardown(Box::new(move || {
                link.detach();
            }));
        }

        executor(TaskContext::new(task.clone()));
        task
    }

    /// Task that runs `produce(signal)` once started, completing with its
    /// value or failing with its error.
    ///
    /// The future is spawned on the Tokio runtime at `start` and is gated by
    /// the task's own signal, so `abort` stops it.
    pub fn from_future<F, Fut>(produce: F) -> Self
    where
        F: FnOnce(Signal) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::new(move |ctx| {
            let _ = ctx.defer_until_run("start", move |task| {
                let run = TaskContext::new(task.clone());
                let signal = run.signal();
                let work = CancellableFuture::new(produce(signal.clone()), &signal);
                tokio::spawn(async move {
                    match work.await {
                        Outcome::Value(value) => {
                            let _ = run.next_until_run(value);
                            let _ = run.complete_until_run();
                        }
                        Outcome::Error(error) => {
                            let _ = run.error_until_run(error);
                        }
                        Outcome::Dismissed | Outcome::Aborted(_) => {}
                    }
                });
            });
        })
    }

    /// Task that runs `job` once started (see [`from_future`](Self::from_future)).
    pub fn from_job<J>(job: Arc<J>) -> Self
    where
        J: Job<T, E> + ?Sized,
    {
        Self::from_future(move |signal| async move { job.run(signal).await })
    }

    /// Current state.
    pub fn state(&self) -> TaskState {
        lock(&self.inner.slot).state
    }

    /// Returns `true` once the task reached `Complete`, `Error` or `Abort`.
    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    /// Last value emitted through `next`.
    pub fn last_value(&self) -> Option<T> {
        lock(&self.inner.slot).last.clone()
    }

    /// Last progress report.
    pub fn progress(&self) -> Option<Progress> {
        lock(&self.inner.slot).progress
    }

    /// Final result, or `None` while the task is not done.
    ///
    /// `Complete` yields `Value(last value)`, `Error` yields `Error(e)` and
    /// `Abort` yields `Aborted(reason)`.
    pub fn outcome(&self) -> Option<Outcome<Option<T>, E>> {
        let slot = lock(&self.inner.slot);
        match slot.state {
            TaskState::Complete => Some(Outcome::Value(slot.last.clone())),
            TaskState::Error => slot.error.clone().map(Outcome::Error),
            TaskState::Abort => slot.reason.clone().map(Outcome::Aborted),
            TaskState::Await | TaskState::Run | TaskState::Pause => None,
        }
    }

    /// Signal cancelled when the task aborts.
    pub fn signal(&self) -> Signal {
        self.inner.controller.signal()
    }

    /// `await → run`.
    pub fn start(&self) -> Result<(), TransitionError> {
        self.transition("start", &[TaskState::Await], TaskState::Run, |_| {
            TaskEvent::Start
        })
    }

    /// `run → pause`.
    pub fn pause(&self) -> Result<(), TransitionError> {
        self.transition("pause", &[TaskState::Run], TaskState::Pause, |_| {
            TaskEvent::Pause
        })
    }

    /// `pause → run`.
    pub fn resume(&self) -> Result<(), TransitionError> {
        self.transition("resume", &[TaskState::Pause], TaskState::Run, |_| {
            TaskEvent::Resume
        })
    }

    /// `await | run | pause → abort`, cancelling the task's signal with `reason`.
    pub fn abort(&self, reason: impl Into<CancelReason>) -> Result<(), TransitionError> {
        let reason = reason.into();
        self.transition(
            "abort",
            &[TaskState::Await, TaskState::Run, TaskState::Pause],
            TaskState::Abort,
            |slot| {
                slot.reason = Some(reason.clone());
                TaskEvent::Abort(reason)
            },
        )
    }

    /// Future settling with the final [`outcome`](Self::outcome).
    pub fn to_future(&self) -> impl Future<Output = Outcome<Option<T>, E>> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        let weak = self.downgrade();
        self.on_teardown(Box::new(move || {
            if let Some(outcome) = weak.upgrade().and_then(|t| t.outcome()) {
                let _ = tx.send(outcome);
            }
        }));
        async move {
            match rx.await {
                Ok(outcome) => outcome,
                Err(_dropped) => futures::future::pending().await,
            }
        }
    }

    /// Registers `callback` for notifications of `kind`.
    pub fn on<F>(&self, kind: TaskEventKind, callback: F) -> Listener<TaskEvent<T, E>>
    where
        F: Fn(&TaskEvent<T, E>) + Send + Sync + 'static,
    {
        self.inner.channel.add_listener(kind.as_str(), callback)
    }

    /// Registers `callback` for the next notification of `kind` only.
    pub fn once<F>(&self, kind: TaskEventKind, callback: F) -> Listener<TaskEvent<T, E>>
    where
        F: FnOnce(&TaskEvent<T, E>) + Send + 'static,
    {
        self.inner.channel.add_listener_once(kind.as_str(), callback)
    }

    /// Registers `callback` for every notification, in dispatch order.
    pub fn on_any<F>(&self, callback: F) -> Listener<TaskEvent<T, E>>
    where
        F: Fn(&Notification<TaskEvent<T, E>>) + Send + Sync + 'static,
    {
        self.inner.channel.add_raw_listener(callback)
    }

    /// Number of listeners currently registered on this task.
    pub fn listener_count(&self) -> usize {
        self.inner.channel.total_listener_count()
    }

    pub(crate) fn next(&self, value: T) -> Result<(), TransitionError> {
        self.transition("next", &[TaskState::Run], TaskState::Run, |slot| {
            slot.last = Some(value.clone());
            TaskEvent::Next(value)
        })
    }

    pub(crate) fn report(&self, progress: Progress) -> Result<(), TransitionError> {
        self.transition("progress", &[TaskState::Run], TaskState::Run, |slot| {
            slot.progress = Some(progress);
            TaskEvent::Progress(progress)
        })
    }

    pub(crate) fn complete(&self) -> Result<(), TransitionError> {
        self.transition("complete", &[TaskState::Run], TaskState::Complete, |slot| {
            TaskEvent::Complete(slot.last.clone())
        })
    }

    pub(crate) fn fail(&self, error: E) -> Result<(), TransitionError> {
        self.transition("error", &[TaskState::Run], TaskState::Error, |slot| {
            slot.error = Some(error.clone());
            TaskEvent::Error(error)
        })
    }

    /// Runs `f` when the task reaches a terminal state, or now if it already has.
    pub(crate) fn on_teardown(&self, f: Teardown) {
        let mut teardown = lock(&self.inner.teardown);
        if let Some(pending) = teardown.as_mut() {
            pending.push(f);
            return;
        }
        drop(teardown);
        f();
    }

    pub(crate) fn downgrade(&self) -> WeakTask<T, E> {
        WeakTask {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn transition<F>(
        &self,
        op: &'static str,
        from: &[TaskState],
        to: TaskState,
        apply: F,
    ) -> Result<(), TransitionError>
    where
        F: FnOnce(&mut Slot<T, E>) -> TaskEvent<T, E>,
    {
        let aborted = {
            let mut slot = lock(&self.inner.slot);
            if !from.contains(&slot.state) {
                return Err(TransitionError::illegal(op, slot.state));
            }
            slot.state = to;
            let event = apply(&mut slot);
            let aborted = match &event {
                TaskEvent::Abort(reason) => Some(reason.clone()),
                _ => None,
            };
            self.inner.channel.post(event.kind().as_str(), event);
            if to.is_terminal() {
                // links must see the terminal notification before they are cut
                let task = self.clone();
                self.inner.channel.post_action(move || task.run_teardown());
            }
            aborted
        };

        if let Some(reason) = aborted {
            self.inner.controller.cancel_with(reason);
        }
        self.inner.channel.flush();
        Ok(())
    }

    fn run_teardown(&self) {
        let pending = lock(&self.inner.teardown).take();
        for f in pending.into_iter().flatten() {
            f();
        }
    }
}

impl<T, E> Clone for Task<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> fmt::Debug for Task<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("state", &lock(&self.inner.slot).state)
            .finish_non_exhaustive()
    }
}

/// Non-owning task handle held by listeners so links never keep a task alive.
pub(crate) struct WeakTask<T, E> {
    inner: Weak<TaskInner<T, E>>,
}

impl<T, E> WeakTask<T, E> {
    pub(crate) fn upgrade(&self) -> Option<Task<T, E>> {
        self.inner.upgrade().map(|inner| Task { inner })
    }
}

impl<T, E> Clone for WeakTask<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}
