//! # Task composition.
//!
//! A binding links a parent task to one child:
//!
//! ```text
//!  parent ── start / resume ──► child.start() or child.resume()
//!         ── pause ───────────► child.pause()
//!         ── abort(r) ────────► child.abort(r)      (after muting the upward leg)
//!
//!  child  ── next(v) ─────────► parent.next(v)
//!         ── progress(p) ─────► route chosen by the composition
//!         ── complete / error / abort ──► settle handler (after muting the downward leg)
//! ```
//!
//! Both legs are detached as soon as either task reaches a terminal state.
//! A leg is deactivated before the opposite control method is invoked, so an
//! abort never bounces back to the task it came from. A child that is already
//! done when bound settles the parent once the parent runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use crate::error::TransitionError;
use crate::kernel::lock;
use crate::notify::Listener;
use crate::signal::{CancelReason, Outcome};

use super::{Progress, ProgressMode, Task, TaskContext, TaskEvent, TaskState};

/// Reason given to siblings aborted because another child failed.
pub const SIBLING_FAILED: &str = "Sibling failed";

enum Settled<E> {
    Complete,
    Error(E),
    Abort(CancelReason),
}

type Leg<T, E> = Arc<OnceLock<Listener<TaskEvent<T, E>>>>;

impl<T, E> TaskContext<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Makes `child` the body of this task.
    ///
    /// Control calls on this task are forwarded to `child`; the child's values
    /// and progress are re-emitted here, and its completion, failure or abort
    /// settles this task the same way.
    pub fn forward(&self, child: &Task<T, E>) {
        bind(
            self.task(),
            child,
            |parent, progress| log_forward(parent.report(progress)),
            |parent, settled| match settled {
                Settled::Complete => log_forward(parent.complete()),
                Settled::Error(e) => log_forward(parent.fail(e)),
                Settled::Abort(reason) => log_forward(parent.abort(reason)),
            },
        );
    }
}

/// Runs `tasks` one after another under a single parent task.
///
/// The parent emits `Progress { loaded: i + 1, total: n }` after child `i`
/// completes and completes after the last one. A failing or aborted child
/// fails or aborts the parent and the remaining children never start.
pub fn tasks_in_sequence<T, E>(tasks: Vec<Task<T, E>>) -> Task<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    Task::new(move |ctx| {
        if tasks.is_empty() {
            let _ = ctx.complete_until_run();
            return;
        }
        step(ctx.task(), Arc::new(tasks), 0);
    })
}

fn step<T, E>(parent: &Task<T, E>, tasks: Arc<Vec<Task<T, E>>>, index: usize)
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let child = tasks[index].clone();
    bind(
        parent,
        &child,
        |_, _| {},
        move |parent, settled| match settled {
            Settled::Complete => {
                let total = tasks.len();
                log_forward(parent.report(Progress::new(index as u64 + 1, total as u64)));
                if index + 1 < total {
                    step(parent, tasks, index + 1);
                } else {
                    log_forward(parent.complete());
                }
            }
            Settled::Error(e) => log_forward(parent.fail(e)),
            Settled::Abort(reason) => log_forward(parent.abort(reason)),
        },
    );
}

/// Runs `tasks` concurrently under a single parent task.
///
/// The parent completes once every child completed. The first child error
/// fails the parent and aborts every sibling still running with
/// [`SIBLING_FAILED`]; a child abort aborts the parent (and through it the
/// siblings). Progress is aggregated according to `mode`.
pub fn tasks_in_parallel<T, E>(tasks: Vec<Task<T, E>>, mode: ProgressMode) -> Task<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    Task::new(move |ctx| {
        if tasks.is_empty() {
            let _ = ctx.complete_until_run();
            return;
        }

        let total = tasks.len();
        let tasks = Arc::new(tasks);
        let completed = Arc::new(AtomicUsize::new(0));
        let latest = Arc::new(Mutex::new(vec![Progress::default(); total]));

        for (index, child) in tasks.iter().enumerate() {
            let latest = Arc::clone(&latest);
            let siblings = Arc::clone(&tasks);
            let completed = Arc::clone(&completed);
            bind(
                ctx.task(),
                child,
                move |parent, progress| {
                    if mode == ProgressMode::Sum {
                        let sum = {
                            let mut latest = lock(&latest);
                            latest[index] = progress;
                            latest.iter().copied().sum()
                        };
                        log_forward(parent.report(sum));
                    }
                },
                move |parent, settled| match settled {
                    Settled::Complete => {
                        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                        if mode == ProgressMode::Count {
                            log_forward(parent.report(Progress::new(done as u64, total as u64)));
                        }
                        if done == total {
                            log_forward(parent.complete());
                        }
                    }
                    Settled::Error(e) => {
                        log_forward(parent.fail(e));
                        for sibling in siblings.iter().filter(|s| !s.is_done()) {
                            log_forward(sibling.abort(SIBLING_FAILED));
                        }
                    }
                    Settled::Abort(reason) => log_forward(parent.abort(reason)),
                },
            );
        }
    })
}

fn bind<T, E, P, S>(parent: &Task<T, E>, child: &Task<T, E>, on_progress: P, on_settled: S)
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    P: Fn(&Task<T, E>, Progress) + Send + Sync + 'static,
    S: FnOnce(&Task<T, E>, Settled<E>) + Send + 'static,
{
    let down: Leg<T, E> = Arc::new(OnceLock::new());
    let up: Leg<T, E> = Arc::new(OnceLock::new());

    let target = child.downgrade();
    let mute = Arc::clone(&up);
    let down_leg = parent.on_any(move |n| {
        let Some(child) = target.upgrade() else { return };
        match n.value() {
            TaskEvent::Start | TaskEvent::Resume => follow_run(&child),
            TaskEvent::Pause => {
                if child.state() == TaskState::Run {
                    log_forward(child.pause());
                }
            }
            TaskEvent::Abort(reason) => {
                if let Some(leg) = mute.get() {
                    leg.deactivate();
                }
                if !child.is_done() {
                    tracing::debug!(reason = %reason, "forwarding abort to child task");
                    log_forward(child.abort(reason.clone()));
                }
            }
            _ => {}
        }
    });

    let target = parent.downgrade();
    let mute = Arc::clone(&down);
    let settle = Arc::new(Mutex::new(Some(on_settled)));
    let pending = Arc::clone(&settle);
    let up_leg = child.on_any(move |n| {
        let Some(parent) = target.upgrade() else { return };
        let settled = match n.value() {
            TaskEvent::Next(value) => {
                log_forward(parent.next(value.clone()));
                return;
            }
            TaskEvent::Progress(progress) => {
                on_progress(&parent, *progress);
                return;
            }
            TaskEvent::Complete(_) => Settled::Complete,
            TaskEvent::Error(e) => Settled::Error(e.clone()),
            TaskEvent::Abort(reason) => Settled::Abort(reason.clone()),
            TaskEvent::Start | TaskEvent::Pause | TaskEvent::Resume => return,
        };
        if let Some(leg) = mute.get() {
            leg.deactivate();
        }
        let handler = lock(&pending).take();
        if let Some(handler) = handler {
            handler(&parent, settled);
        }
    });

    let _ = down.set(down_leg.clone());
    let _ = up.set(up_leg.clone());

    let legs = [down_leg, up_leg];
    for task in [parent, child] {
        let legs = legs.clone();
        task.on_teardown(Box::new(move || {
            for leg in &legs {
                leg.detach();
            }
        }));
    }

    if parent.state() == TaskState::Run {
        follow_run(child);
    }

    // a child that finished before it was bound never notifies again
    let Some(outcome) = child.outcome() else { return };
    let (last, settled) = match outcome {
        Outcome::Value(last) => (last, Settled::Complete),
        Outcome::Error(e) => (None, Settled::Error(e)),
        Outcome::Aborted(reason) => (None, Settled::Abort(reason)),
        Outcome::Dismissed => return,
    };
    if let Some(leg) = down.get() {
        leg.deactivate();
    }
    let Some(handler) = lock(&settle).take() else { return };
    let ctx = TaskContext::new(parent.clone());
    log_forward(ctx.defer_until_run("settle", move |parent| {
        if let Some(value) = last {
            log_forward(parent.next(value));
        }
        handler(parent, settled);
    }));
}

fn follow_run<T, E>(child: &Task<T, E>)
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    match child.state() {
        TaskState::Await => log_forward(child.start()),
        TaskState::Pause => log_forward(child.resume()),
        _ => {}
    }
}

fn log_forward(result: Result<(), TransitionError>) {
    if let Err(e) = result {
        tracing::debug!(label = e.as_label(), error = %e, "forwarded task call rejected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Outcome;
    use crate::task::TaskEventKind;

    type Pair = (Task<u32, String>, TaskContext<u32, String>);

    fn pair() -> Pair {
        let slot = Arc::new(OnceLock::new());
        let keep = slot.clone();
        let task = Task::new(move |ctx| {
            let _ = keep.set(ctx);
        });
        let ctx = slot.get().cloned().unwrap();
        (task, ctx)
    }

    fn count(task: &Task<u32, String>, kind: TaskEventKind) -> Arc<AtomicUsize> {
        let n = Arc::new(AtomicUsize::new(0));
        let hits = n.clone();
        task.on(kind, move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        });
        n
    }

    fn progress_log(task: &Task<u32, String>) -> Arc<Mutex<Vec<Progress>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        task.on(TaskEventKind::Progress, move |e| {
            if let TaskEvent::Progress(p) = e {
                sink.lock().unwrap().push(*p);
            }
        });
        log
    }

    #[test]
    fn test_forward_drives_child_and_reports_back() {
        let (child, cctx) = pair();
        let parent = Task::new(|ctx| ctx.forward(&child));

        parent.start().unwrap();
        assert_eq!(child.state(), TaskState::Run);
        parent.pause().unwrap();
        assert_eq!(child.state(), TaskState::Pause);
        parent.resume().unwrap();

        cctx.next(5).unwrap();
        cctx.complete().unwrap();
        assert_eq!(parent.outcome(), Some(Outcome::Value(Some(5))));
        assert_eq!(parent.listener_count(), 0);
        assert_eq!(child.listener_count(), 0);
    }

    #[test]
    fn test_parent_abort_reaches_child_once() {
        let (child, _cctx) = pair();
        let parent = Task::new(|ctx| ctx.forward(&child));
        let parent_aborts = count(&parent, TaskEventKind::Abort);
        let child_aborts = count(&child, TaskEventKind::Abort);

        parent.start().unwrap();
        parent.abort("user").unwrap();

        assert_eq!(child.outcome(), Some(Outcome::Aborted("user".into())));
        assert_eq!(parent_aborts.load(Ordering::SeqCst), 1);
        assert_eq!(child_aborts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_child_abort_aborts_parent() {
        let (child, _cctx) = pair();
        let parent = Task::new(|ctx| ctx.forward(&child));
        parent.start().unwrap();
        child.abort("inner").unwrap();
        assert_eq!(parent.outcome(), Some(Outcome::Aborted("inner".into())));
    }

    #[test]
    fn test_child_error_fails_parent() {
        let (child, cctx) = pair();
        let parent = Task::new(|ctx| ctx.forward(&child));
        parent.start().unwrap();
        cctx.error("bad".into()).unwrap();
        assert_eq!(parent.outcome(), Some(Outcome::Error("bad".to_string())));
    }

    #[test]
    fn test_sequence_runs_children_in_order() {
        let (a, actx) = pair();
        let (b, bctx) = pair();
        let (c, cctx) = pair();
        let parent = tasks_in_sequence(vec![a.clone(), b.clone(), c.clone()]);
        let progress = progress_log(&parent);

        parent.start().unwrap();
        assert_eq!((a.state(), b.state()), (TaskState::Run, TaskState::Await));

        actx.next(1).unwrap();
        actx.complete().unwrap();
        assert_eq!(b.state(), TaskState::Run);
        bctx.complete().unwrap();
        assert_eq!(parent.state(), TaskState::Run);
        cctx.next(3).unwrap();
        cctx.complete().unwrap();

        assert_eq!(parent.outcome(), Some(Outcome::Value(Some(3))));
        assert_eq!(
            *progress.lock().unwrap(),
            vec![Progress::new(1, 3), Progress::new(2, 3), Progress::new(3, 3)]
        );
    }

    #[test]
    fn test_sequence_stops_on_error() {
        let (a, actx) = pair();
        let (b, _bctx) = pair();
        let parent = tasks_in_sequence(vec![a, b.clone()]);
        parent.start().unwrap();
        actx.error("first".into()).unwrap();
        assert_eq!(parent.state(), TaskState::Error);
        assert_eq!(b.state(), TaskState::Await);
    }

    #[test]
    fn test_empty_compositions_complete_on_start() {
        let seq: Task<u32, String> = tasks_in_sequence(Vec::new());
        seq.start().unwrap();
        assert_eq!(seq.outcome(), Some(Outcome::Value(None)));

        let par: Task<u32, String> = tasks_in_parallel(Vec::new(), ProgressMode::Count);
        par.start().unwrap();
        assert_eq!(par.state(), TaskState::Complete);
    }

    #[test]
    fn test_parallel_error_aborts_siblings_and_fails_parent() {
        let (a, actx) = pair();
        let (b, _bctx) = pair();
        let (c, _cctx) = pair();
        let parent = tasks_in_parallel(vec![a, b.clone(), c.clone()], ProgressMode::Count);
        parent.start().unwrap();
        assert_eq!(c.state(), TaskState::Run);

        actx.error("boom".into()).unwrap();
        assert_eq!(parent.outcome(), Some(Outcome::Error("boom".to_string())));
        assert_eq!(b.outcome(), Some(Outcome::Aborted(SIBLING_FAILED.into())));
        assert_eq!(c.state(), TaskState::Abort);
    }

    #[test]
    fn test_parallel_count_progress_and_completion() {
        let (a, actx) = pair();
        let (b, bctx) = pair();
        let parent = tasks_in_parallel(vec![a, b], ProgressMode::Count);
        let progress = progress_log(&parent);
        parent.start().unwrap();

        bctx.complete().unwrap();
        assert_eq!(parent.state(), TaskState::Run);
        actx.next(10).unwrap();
        actx.complete().unwrap();

        assert_eq!(parent.outcome(), Some(Outcome::Value(Some(10))));
        assert_eq!(*progress.lock().unwrap(), vec![Progress::new(1, 2), Progress::new(2, 2)]);
    }

    #[test]
    fn test_parallel_sum_progress() {
        let (a, actx) = pair();
        let (b, bctx) = pair();
        let parent = tasks_in_parallel(vec![a, b], ProgressMode::Sum);
        parent.start().unwrap();

        actx.progress(Progress::new(1, 4)).unwrap();
        bctx.progress(Progress::new(2, 6)).unwrap();
        actx.progress(Progress::new(4, 4)).unwrap();
        assert_eq!(parent.progress(), Some(Progress::new(6, 10)));
    }

    #[test]
    fn test_parent_abort_reaches_every_parallel_child() {
        let (a, _actx) = pair();
        let (b, _bctx) = pair();
        let parent = tasks_in_parallel(vec![a.clone(), b.clone()], ProgressMode::Count);
        parent.start().unwrap();
        parent.abort("stop").unwrap();
        assert_eq!(a.outcome(), Some(Outcome::Aborted("stop".into())));
        assert_eq!(b.outcome(), Some(Outcome::Aborted("stop".into())));
    }

    #[test]
    fn test_forward_settles_when_child_finishes_from_its_start_listeners() {
        let (child, cctx) = pair();
        cctx.next_until_run(7).unwrap();
        cctx.complete_until_run().unwrap();
        let parent = Task::new(|ctx| ctx.forward(&child));

        parent.start().unwrap();
        assert_eq!(child.state(), TaskState::Complete);
        assert_eq!(parent.outcome(), Some(Outcome::Value(Some(7))));
        assert_eq!(parent.listener_count(), 0);
    }

    #[test]
    fn test_nested_empty_sequence_settles_outer() {
        let inner: Task<u32, String> = tasks_in_sequence(Vec::new());
        let outer = tasks_in_sequence(vec![inner.clone()]);
        outer.start().unwrap();
        assert_eq!(inner.state(), TaskState::Complete);
        assert_eq!(outer.outcome(), Some(Outcome::Value(None)));
    }

    #[test]
    fn test_sequence_of_aborted_child_aborts_on_start() {
        let (child, _cctx) = pair();
        child.abort("gone").unwrap();
        let parent = tasks_in_sequence(vec![child]);
        assert_eq!(parent.state(), TaskState::Await);

        parent.start().unwrap();
        assert_eq!(parent.outcome(), Some(Outcome::Aborted("gone".into())));
    }

    #[test]
    fn test_forward_of_completed_child_carries_its_value() {
        let (child, cctx) = pair();
        child.start().unwrap();
        cctx.next(3).unwrap();
        cctx.complete().unwrap();

        let parent = Task::new(|ctx| ctx.forward(&child));
        parent.start().unwrap();
        assert_eq!(parent.outcome(), Some(Outcome::Value(Some(3))));
    }

    #[test]
    fn test_parallel_counts_already_completed_children() {
        let (a, actx) = pair();
        a.start().unwrap();
        actx.complete().unwrap();
        let (b, bctx) = pair();

        let parent = tasks_in_parallel(vec![a, b], ProgressMode::Count);
        let progress = progress_log(&parent);
        parent.start().unwrap();
        assert_eq!(parent.state(), TaskState::Run);

        bctx.complete().unwrap();
        assert_eq!(parent.state(), TaskState::Complete);
        assert_eq!(progress.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_child_abort_from_another_thread_during_parent_drain() {
        use std::sync::mpsc;

        let (child, _cctx) = pair();
        let parent = Task::new(|ctx| ctx.forward(&child));
        parent.start().unwrap();

        let (entered_tx, entered_rx) = mpsc::channel::<()>();
        let (go_tx, go_rx) = mpsc::channel::<()>();
        let entered_tx = Mutex::new(entered_tx);
        let go_rx = Mutex::new(go_rx);
        child.on(TaskEventKind::Pause, move |_| {
            let _ = entered_tx.lock().unwrap().send(());
            let _ = go_rx.lock().unwrap().recv();
        });

        let pausing = parent.clone();
        let worker = std::thread::spawn(move || pausing.pause());
        entered_rx.recv().unwrap();

        // the worker is still delivering `pause`; this abort is queued behind it
        child.abort("gone").unwrap();
        go_tx.send(()).unwrap();
        worker.join().unwrap().unwrap();

        assert_eq!(child.state(), TaskState::Abort);
        assert_eq!(parent.outcome(), Some(Outcome::Aborted("gone".into())));
        assert_eq!(parent.listener_count(), 0);
    }
}
