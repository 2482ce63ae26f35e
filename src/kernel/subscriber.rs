use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use super::emitter::{Emitter, EmitterInner};
use super::lock;

type Callback<T> = Box<dyn Fn(&T) + Send + Sync>;

/// Consumer side of the kernel.
///
/// A subscriber holds a callback and an active flag. It is attached to at
/// most one [`Emitter`] at a time; inactive subscribers never receive values.
///
/// Cloning yields another handle to the **same** subscriber.
pub struct Subscriber<T> {
    pub(super) inner: Arc<SubscriberInner<T>>,
}

pub(super) struct SubscriberInner<T> {
    callback: Callback<T>,
    active: AtomicBool,
    emitter: Mutex<Option<Weak<EmitterInner<T>>>>,
}

impl<T: Send + 'static> Subscriber<T> {
    /// Creates an active, detached subscriber.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(SubscriberInner {
                callback: Box::new(callback),
                active: AtomicBool::new(true),
                emitter: Mutex::new(None),
            }),
        }
    }

    /// Creates a subscriber that fires at most once.
    ///
    /// On the first delivery it deactivates and detaches itself before
    /// invoking `callback`, so a re-entrant emit cannot reach it twice.
    pub fn once<F>(callback: F) -> Self
    where
        F: FnOnce(&T) + Send + 'static,
    {
        let slot = Mutex::new(Some(callback));
        let inner = Arc::new_cyclic(|me: &Weak<SubscriberInner<T>>| {
            let me = me.clone();
            SubscriberInner {
                callback: Box::new(move |value: &T| {
                    let Some(f) = lock(&slot).take() else { return };
                    if let Some(inner) = me.upgrade() {
                        let sub = Subscriber { inner };
                        sub.deactivate();
                        sub.detach();
                    }
                    f(value);
                }),
                active: AtomicBool::new(true),
                emitter: Mutex::new(None),
            }
        });
        Self { inner }
    }

    /// Returns `true` if the subscriber will receive values when attached.
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Re-enables delivery.
    pub fn activate(&self) {
        self.inner.active.store(true, Ordering::Release);
    }

    /// Stops delivery without detaching.
    ///
    /// Takes effect immediately, including for a delivery already in progress
    /// on the same emitter.
    pub fn deactivate(&self) {
        self.inner.active.store(false, Ordering::Release);
    }

    /// Returns `true` while attached to a live emitter.
    pub fn is_attached(&self) -> bool {
        lock(&self.inner.emitter)
            .as_ref()
            .is_some_and(|w| w.strong_count() > 0)
    }

    /// Detaches from the current emitter, if any. Idempotent.
    pub fn detach(&self) -> bool {
        let current = lock(&self.inner.emitter).as_ref().and_then(Weak::upgrade);
        match current {
            Some(inner) => Emitter::from_inner(inner).detach(self),
            None => false,
        }
    }
}

impl<T> SubscriberInner<T> {
    pub(super) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(super) fn call(&self, value: &T) {
        (self.callback)(value)
    }

    pub(super) fn is_attached_to(&self, emitter: &Arc<EmitterInner<T>>) -> bool {
        lock(&self.emitter)
            .as_ref()
            .is_some_and(|w| std::ptr::eq(w.as_ptr(), Arc::as_ptr(emitter)))
    }

    pub(super) fn current_emitter(&self) -> Option<Arc<EmitterInner<T>>> {
        lock(&self.emitter).as_ref().and_then(Weak::upgrade)
    }

    pub(super) fn set_emitter(&self, emitter: Option<Weak<EmitterInner<T>>>) {
        *lock(&self.emitter) = emitter;
    }
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for Subscriber<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Eq for Subscriber<T> {}

impl<T> fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("active", &self.inner.is_active())
            .field("attached", &self.inner.current_emitter().is_some())
            .finish()
    }
}
