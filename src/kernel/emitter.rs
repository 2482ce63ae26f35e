use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use super::lock;
use super::subscriber::{Subscriber, SubscriberInner};

type Hook = Arc<dyn Fn() + Send + Sync>;
type Action = Box<dyn FnOnce() + Send>;

/// Producer side of the kernel.
///
/// Owns an ordered list of attached [`Subscriber`]s and delivers every
/// emitted value to each of them, in attach order.
///
/// Cloning yields another handle to the **same** emitter.
///
/// ## Rules
/// - Values are delivered one at a time, in emit order, by a single drainer.
/// - An emit issued while another call is draining (a callback of this
///   emitter, or another thread) is queued and delivered by that drainer;
///   such an `emit` may return before delivery.
///
/// # Example
/// ```
/// use std::sync::{Arc, Mutex};
/// use cancelvisor::{Emitter, Subscriber};
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let emitter = Emitter::new();
/// let sink = seen.clone();
/// let sub = Subscriber::new(move |v: &u32| sink.lock().unwrap().push(*v));
///
/// emitter.attach(&sub);
/// emitter.emit(1);
/// sub.detach();
/// emitter.emit(2);
///
/// assert_eq!(*seen.lock().unwrap(), vec![1]);
/// ```
pub struct Emitter<T> {
    inner: Arc<EmitterInner<T>>,
}

pub(super) struct EmitterInner<T> {
    subscribers: Mutex<Vec<Arc<SubscriberInner<T>>>>,
    pending: Mutex<Pending<T>>,
    hooks: Mutex<Hooks>,
}

struct Pending<T> {
    items: VecDeque<Queued<T>>,
    draining: bool,
}

enum Queued<T> {
    Value(T),
    Action(Action),
}

#[derive(Default)]
struct Hooks {
    first: Option<Hook>,
    last: Option<Hook>,
}

/// Resets the drain flag if a callback unwinds out of `emit`.
struct DrainGuard<'a, T> {
    pending: &'a Mutex<Pending<T>>,
}

impl<T> Drop for DrainGuard<'_, T> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            lock(self.pending).draining = false;
        }
    }
}

impl<T: Send + 'static> Emitter<T> {
    /// Creates an emitter with no subscribers and no hooks.
    pub fn new() -> Self {
        Self::from_inner(Arc::new(EmitterInner {
            subscribers: Mutex::new(Vec::new()),
            pending: Mutex::new(Pending {
                items: VecDeque::new(),
                draining: false,
            }),
            hooks: Mutex::new(Hooks::default()),
        }))
    }

    pub(super) fn from_inner(inner: Arc<EmitterInner<T>>) -> Self {
        Self { inner }
    }

    /// Installs the hook invoked when the subscriber count goes 0 → 1.
    ///
    /// Replaces any previous hook.
    pub fn on_first_attach<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        lock(&self.inner.hooks).first = Some(Arc::new(hook));
    }

    /// Installs the hook invoked when the subscriber count goes 1 → 0.
    ///
    /// Replaces any previous hook.
    pub fn on_last_detach<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        lock(&self.inner.hooks).last = Some(Arc::new(hook));
    }

    /// Attaches `subscriber`, moving it away from any other emitter first.
    ///
    /// Attaching a subscriber that is already attached here is a no-op.
    pub fn attach(&self, subscriber: &Subscriber<T>) {
        let sub = &subscriber.inner;
        match sub.current_emitter() {
            Some(current) if Arc::ptr_eq(&current, &self.inner) => return,
            Some(current) => {
                Emitter::from_inner(current).detach(subscriber);
            }
            None => {}
        }

        let became_first = {
            let mut subs = lock(&self.inner.subscribers);
            subs.push(Arc::clone(sub));
            sub.set_emitter(Some(Arc::downgrade(&self.inner)));
            subs.len() == 1
        };

        if became_first {
            self.run_hook(|h| h.first.clone());
        }
    }

    /// Detaches `subscriber`. Returns `false` if it was not attached here.
    pub fn detach(&self, subscriber: &Subscriber<T>) -> bool {
        let sub = &subscriber.inner;
        let (removed, now_empty) = {
            let mut subs = lock(&self.inner.subscribers);
            let before = subs.len();
            subs.retain(|s| !Arc::ptr_eq(s, sub));
            let removed = subs.len() != before;
            if removed && sub.is_attached_to(&self.inner) {
                sub.set_emitter(None);
            }
            (removed, removed && subs.is_empty())
        };

        if now_empty {
            self.run_hook(|h| h.last.clone());
        }
        removed
    }

    /// Delivers `value` to every active, attached subscriber.
    ///
    /// When another call is already draining, the value is queued and
    /// delivered by that call after everything queued before it.
    pub fn emit(&self, value: T) {
        self.enqueue(value);
        self.flush();
    }

    /// Queues `value` without delivering it.
    ///
    /// Lets a caller fix the delivery order while it still holds its own lock;
    /// [`flush`](Self::flush) must follow once that lock is released.
    pub(crate) fn enqueue(&self, value: T) {
        lock(&self.inner.pending).items.push_back(Queued::Value(value));
    }

    /// Queues `action` to run in order with queued values, by whichever call
    /// drains them.
    pub(crate) fn enqueue_action(&self, action: Action) {
        lock(&self.inner.pending).items.push_back(Queued::Action(action));
    }

    /// Drains queued values unless another call is already draining them.
    pub(crate) fn flush(&self) {
        {
            let mut pending = lock(&self.inner.pending);
            if pending.draining || pending.items.is_empty() {
                return;
            }
            pending.draining = true;
        }

        let _guard = DrainGuard {
            pending: &self.inner.pending,
        };
        loop {
            let next = {
                let mut pending = lock(&self.inner.pending);
                match pending.items.pop_front() {
                    Some(item) => item,
                    None => {
                        pending.draining = false;
                        return;
                    }
                }
            };
            match next {
                Queued::Value(value) => self.deliver(&value),
                Queued::Action(action) => action(),
            }
        }
    }

    /// Detaches every subscriber. Fires the last-detach hook if any were attached.
    pub fn clear(&self) -> usize {
        let drained: Vec<Arc<SubscriberInner<T>>> = {
            let mut subs = lock(&self.inner.subscribers);
            let drained: Vec<_> = subs.drain(..).collect();
            for sub in &drained {
                if sub.is_attached_to(&self.inner) {
                    sub.set_emitter(None);
                }
            }
            drained
        };

        if !drained.is_empty() {
            self.run_hook(|h| h.last.clone());
        }
        drained.len()
    }

    /// Returns `true` if both handles point to the same emitter.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of attached subscribers (active or not).
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.subscribers).len()
    }

    /// Returns `true` if no subscriber is attached.
    pub fn is_empty(&self) -> bool {
        self.subscriber_count() == 0
    }

    fn deliver(&self, value: &T) {
        let snapshot: Vec<Arc<SubscriberInner<T>>> = lock(&self.inner.subscribers).clone();
        for sub in snapshot {
            if sub.is_active() && sub.is_attached_to(&self.inner) {
                sub.call(value);
            }
        }
    }

    fn run_hook(&self, pick: impl FnOnce(&Hooks) -> Option<Hook>) {
        let hook = pick(&lock(&self.inner.hooks));
        if let Some(hook) = hook {
            hook();
        }
    }
}

impl<T: Send + 'static> Default for Emitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("subscribers", &lock(&self.inner.subscribers).len())
            .finish()
    }
}
