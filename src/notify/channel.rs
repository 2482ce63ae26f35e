use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use crate::kernel::{lock, Emitter, Subscriber};

use super::Notification;

type Envelope<V> = Arc<Notification<V>>;

/// Multiplexed set of named channels over one producer.
///
/// Cloning yields another handle to the **same** channel.
///
/// # Example
/// ```
/// use std::sync::{Arc, Mutex};
/// use cancelvisor::NotificationChannel;
///
/// let channel = NotificationChannel::new();
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = seen.clone();
/// channel.add_listener("tick", move |v: &u32| sink.lock().unwrap().push(*v));
///
/// channel.dispatch("tick", 1);
/// channel.dispatch("tock", 2);
/// assert_eq!(*seen.lock().unwrap(), vec![1]);
/// ```
pub struct NotificationChannel<V> {
    inner: Arc<ChannelInner<V>>,
}

struct ChannelInner<V> {
    buckets: Mutex<HashMap<Arc<str>, Emitter<Envelope<V>>>>,
    raw: Emitter<Envelope<V>>,
    router: Emitter<Envelope<V>>,
}

/// Handle to one registration on a [`NotificationChannel`].
///
/// Dropping the handle does **not** unsubscribe; call [`Listener::detach`]
/// or [`NotificationChannel::remove_listener`].
pub struct Listener<V> {
    name: Option<Arc<str>>,
    subscriber: Subscriber<Envelope<V>>,
}

impl<V: Send + Sync + 'static> NotificationChannel<V> {
    /// Creates a channel without listeners.
    pub fn new() -> Self {
        let inner = Arc::new_cyclic(|me: &Weak<ChannelInner<V>>| {
            let router = Emitter::new();
            let me = me.clone();
            router.attach(&Subscriber::new(move |n: &Envelope<V>| {
                if let Some(inner) = me.upgrade() {
                    inner.route(n);
                }
            }));
            ChannelInner {
                buckets: Mutex::new(HashMap::new()),
                raw: Emitter::new(),
                router,
            }
        });
        Self { inner }
    }

    /// Registers `callback` for notifications named `name`.
    pub fn add_listener<F>(&self, name: &str, callback: F) -> Listener<V>
    where
        F: Fn(&V) + Send + Sync + 'static,
    {
        let sub = Subscriber::new(move |n: &Envelope<V>| callback(n.value()));
        self.attach_named(name, sub)
    }

    /// Registers `callback` for the next notification named `name` only.
    pub fn add_listener_once<F>(&self, name: &str, callback: F) -> Listener<V>
    where
        F: FnOnce(&V) + Send + 'static,
    {
        let sub = Subscriber::once(move |n: &Envelope<V>| callback(n.value()));
        self.attach_named(name, sub)
    }

    /// Registers `callback` for every notification, whatever its name.
    pub fn add_raw_listener<F>(&self, callback: F) -> Listener<V>
    where
        F: Fn(&Notification<V>) + Send + Sync + 'static,
    {
        let sub = Subscriber::new(move |n: &Envelope<V>| callback(n));
        self.inner.raw.attach(&sub);
        Listener {
            name: None,
            subscriber: sub,
        }
    }

    /// Removes one registration. Returns `false` if it was already gone.
    pub fn remove_listener(&self, listener: &Listener<V>) -> bool {
        listener.detach()
    }

    /// Removes every listener registered under `name`. Returns how many were removed.
    pub fn remove_all(&self, name: &str) -> usize {
        let bucket = lock(&self.inner.buckets).remove(name);
        bucket.map_or(0, |b| b.clear())
    }

    /// Delivers `value` to listeners of `name`, then to raw listeners.
    pub fn dispatch(&self, name: &str, value: V) {
        self.post(name, value);
        self.flush();
    }

    /// Queues a notification without delivering it (see [`flush`](Self::flush)).
    pub(crate) fn post(&self, name: &str, value: V) {
        self.inner
            .router
            .enqueue(Arc::new(Notification::new(name, value)));
    }

    /// Queues `action` behind the notifications posted so far; it runs once
    /// they have reached every listener.
    pub(crate) fn post_action<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.router.enqueue_action(Box::new(action));
    }

    /// Delivers queued notifications.
    pub(crate) fn flush(&self) {
        self.inner.router.flush();
    }

    /// Number of listeners registered under `name`.
    pub fn listener_count(&self, name: &str) -> usize {
        lock(&self.inner.buckets)
            .get(name)
            .map_or(0, Emitter::subscriber_count)
    }

    /// Number of raw listeners.
    pub fn raw_listener_count(&self) -> usize {
        self.inner.raw.subscriber_count()
    }

    /// Number of listeners across all names, raw listeners included.
    pub fn total_listener_count(&self) -> usize {
        let named: usize = lock(&self.inner.buckets)
            .values()
            .map(Emitter::subscriber_count)
            .sum();
        named + self.raw_listener_count()
    }

    fn attach_named(&self, name: &str, sub: Subscriber<Envelope<V>>) -> Listener<V> {
        let name: Arc<str> = Arc::from(name);
        let mut buckets = lock(&self.inner.buckets);
        let bucket = buckets
            .entry(Arc::clone(&name))
            .or_insert_with(|| self.new_bucket(Arc::clone(&name)));
        bucket.attach(&sub);
        Listener {
            name: Some(name),
            subscriber: sub,
        }
    }

    fn new_bucket(&self, name: Arc<str>) -> Emitter<Envelope<V>> {
        let bucket = Emitter::new();
        let channel = Arc::downgrade(&self.inner);
        bucket.on_last_detach(move || {
            let Some(inner) = channel.upgrade() else { return };
            let mut buckets = lock(&inner.buckets);
            if buckets.get(&name).is_some_and(Emitter::is_empty) {
                buckets.remove(&name);
            }
        });
        bucket
    }
}

impl<V: Send + Sync + 'static> ChannelInner<V> {
    fn route(&self, n: &Envelope<V>) {
        let bucket = lock(&self.buckets).get(n.name()).cloned();
        if let Some(bucket) = bucket {
            bucket.emit(Arc::clone(n));
        }
        if !self.raw.is_empty() {
            self.raw.emit(Arc::clone(n));
        }
    }
}

impl<V: Send + Sync + 'static> Listener<V> {
    /// Name this listener filters on; `None` for raw listeners.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns `true` while still registered.
    pub fn is_attached(&self) -> bool {
        self.subscriber.is_attached()
    }

    /// Returns `true` if notifications will be delivered.
    pub fn is_active(&self) -> bool {
        self.subscriber.is_active()
    }

    /// Suspends delivery without unregistering.
    pub fn deactivate(&self) {
        self.subscriber.deactivate();
    }

    /// Resumes delivery.
    pub fn activate(&self) {
        self.subscriber.activate();
    }

    /// Unregisters. Idempotent.
    pub fn detach(&self) -> bool {
        self.subscriber.detach()
    }
}

impl<V: Send + Sync + 'static> Default for NotificationChannel<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for NotificationChannel<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Clone for Listener<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            subscriber: self.subscriber.clone(),
        }
    }
}

impl<V> fmt::Debug for NotificationChannel<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = lock(&self.inner.buckets)
            .keys()
            .map(|k| k.to_string())
            .collect();
        f.debug_struct("NotificationChannel")
            .field("names", &names)
            .finish()
    }
}

impl<V> fmt::Debug for Listener<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("name", &self.name)
            .field("subscriber", &self.subscriber)
            .finish()
    }
}
