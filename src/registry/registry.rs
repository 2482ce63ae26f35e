//! # Operation registry - keyed, single-flight cancellable operations.
//!
//! Each live key owns one entry: the operation's shared future plus the
//! controller of its cancellation scope.
//!
//! ## Architecture
//! ```text
//! register(key, mode, factory)
//!   ├─ key free ─────────► factory(signal) under a fresh Controller ─► spawn driver ─► insert
//!   └─ key live ─┬─ Skip / Warn ─► live Operation
//!                ├─ Throw ───────► RegistryError::Occupied
//!                ├─ Replace ─────► cancel live ─┐
//!                └─ Queue ───────────────────────┴─► new entry awaits live one, then factory(signal)
//!
//! driver: body.await ─► remove entry (if still ours) ─► outcome visible to awaiters
//! ```
//!
//! ## Rules
//! - Registry owns the entries (`Operation` + `Controller`).
//! - An entry is removed exactly when its operation settles, never by the caller.
//! - Removal is keyed by entry id, so a settled predecessor never removes its successor.
//! - `clear_all` cancels one entry at a time until the map is empty.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::RwLock;

use crate::error::{ConfigError, RegistryError};
use crate::job::Job;
use crate::signal::{CancelReason, Controller, Outcome, Signal, WrapOptions};

use super::{Activable, Operation, RegisterMode, RegistryConfig};

/// Live entry for one key.
struct Entry<T, E> {
    /// Distinguishes this entry from earlier ones under the same key.
    id: u64,
    /// Shared handle to the operation.
    operation: Operation<T, E>,
    /// Controller of the operation's cancellation scope.
    controller: Arc<Controller>,
}

struct RegistryInner<K, T, E> {
    entries: RwLock<HashMap<K, Entry<T, E>>>,
    config: RegistryConfig,
    next_id: AtomicU64,
}

/// Keyed registry of cancellable operations.
///
/// Keys are any `Eq + Hash + Clone` value; tuples serve as composite keys.
/// Cloning yields another handle to the **same** registry.
///
/// # Example
/// ```
/// use cancelvisor::{OperationRegistry, Outcome, RegisterMode};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let registry: OperationRegistry<(&str, u32), u32, ()> = OperationRegistry::default();
///
/// let first = registry.register(("user", 7), |_signal| async { Ok(1) }).await.unwrap();
/// let again = registry
///     .register_with(("user", 7), RegisterMode::Skip, |_signal| async { Ok(2) })
///     .await
///     .unwrap();
///
/// assert_eq!(again.await, Outcome::Value(1));
/// assert_eq!(first.await, Outcome::Value(1));
/// assert!(registry.is_empty().await);
/// # }
/// ```
pub struct OperationRegistry<K, T, E> {
    inner: Arc<RegistryInner<K, T, E>>,
}

impl<K, T, E> OperationRegistry<K, T, E>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Creates a registry after validating `config`.
    pub fn new(config: RegistryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: RegistryConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                entries: RwLock::new(HashMap::new()),
                config,
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Registers under the configured default mode.
    pub async fn register<F, Fut>(&self, key: K, factory: F) -> Result<Operation<T, E>, RegistryError>
    where
        F: FnOnce(Signal) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.register_with(key, self.inner.config.default_mode, factory)
            .await
    }

    /// Registers `factory` under `key`, resolving a collision with `mode`.
    ///
    /// The factory receives the signal of the new operation's scope. It runs
    /// now when the key is free, later (or never, if cleared meanwhile) under
    /// `Replace` and `Queue`, and never under `Skip`, `Warn` and `Throw`
    /// collisions.
    pub async fn register_with<F, Fut>(
        &self,
        key: K,
        mode: RegisterMode,
        factory: F,
    ) -> Result<Operation<T, E>, RegistryError>
    where
        F: FnOnce(Signal) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let mut entries = self.inner.entries.write().await;

        let controller = Arc::new(Controller::new());
        let signal = controller.signal();
        let options = || WrapOptions::new(self.inner.config.strategy);

        let body = match entries.get(&key) {
            None => signal.wrap_future(factory(signal.clone()), options()),
            Some(live) => match mode {
                RegisterMode::Skip => return Ok(live.operation.clone()),
                RegisterMode::Warn => {
                    tracing::warn!(key = ?key, "operation already registered; returning the live one");
                    return Ok(live.operation.clone());
                }
                RegisterMode::Throw => {
                    return Err(RegistryError::Occupied {
                        key: format!("{key:?}"),
                    });
                }
                RegisterMode::Replace | RegisterMode::Queue => {
                    if mode == RegisterMode::Replace {
                        tracing::debug!(key = ?key, "replacing live operation");
                        live.controller
                            .cancel_with(self.inner.config.replace_reason.clone());
                    }
                    let previous = live.operation.clone();
                    let gate = signal.clone();
                    signal.wrap_future(
                        async move {
                            let _ = previous.await;
                            factory(gate).await
                        },
                        options(),
                    )
                }
            },
        };

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let operation = self.drive(key.clone(), id, body, signal);
        entries.insert(
            key,
            Entry {
                id,
                operation: operation.clone(),
                controller,
            },
        );
        Ok(operation)
    }

    /// Registers an activable resource built by `factory`.
    ///
    /// The resource is activated at once. The operation settles with
    /// `T::default()` when the resource becomes inactive on its own; if the
    /// operation is cancelled first, the resource is deactivated.
    pub async fn register_activable<A, F>(
        &self,
        key: K,
        mode: RegisterMode,
        factory: F,
    ) -> Result<Operation<T, E>, RegistryError>
    where
        A: Activable + ?Sized,
        F: FnOnce(Signal) -> Arc<A> + Send + 'static,
        T: Default,
    {
        self.register_with(key, mode, move |signal| {
            let resource = factory(signal.clone());
            resource.activate();
            let target = Arc::clone(&resource);
            let link = signal.on_abort_once(move |_| target.deactivate());
            async move {
                resource.activation().inactive().await;
                link.detach();
                Ok(T::default())
            }
        })
        .await
    }

    /// Registers a [`Job`]; the job runs with the operation's signal.
    pub async fn register_job<J>(
        &self,
        key: K,
        mode: RegisterMode,
        job: Arc<J>,
    ) -> Result<Operation<T, E>, RegistryError>
    where
        J: Job<T, E> + ?Sized,
    {
        self.register_with(key, mode, move |signal| async move { job.run(signal).await })
            .await
    }

    /// Live operation under `key`.
    pub async fn get(&self, key: &K) -> Option<Operation<T, E>> {
        let entries = self.inner.entries.read().await;
        entries.get(key).map(|e| e.operation.clone())
    }

    /// Returns `true` if `key` has a live operation.
    pub async fn contains(&self, key: &K) -> bool {
        self.inner.entries.read().await.contains_key(key)
    }

    /// Number of live operations.
    pub async fn len(&self) -> usize {
        self.inner.entries.read().await.len()
    }

    /// Returns `true` if no operation is live.
    pub async fn is_empty(&self) -> bool {
        self.inner.entries.read().await.is_empty()
    }

    /// Keys with a live operation, in no particular order.
    pub async fn keys(&self) -> Vec<K> {
        self.inner.entries.read().await.keys().cloned().collect()
    }

    /// Cancels the operation under `key` with the configured clear reason.
    ///
    /// Returns the operation so the caller can await its settlement.
    pub async fn clear(&self, key: &K) -> Option<Operation<T, E>> {
        self.clear_with(key, self.inner.config.clear_reason.clone())
            .await
    }

    /// Cancels the operation under `key` with `reason`.
    pub async fn clear_with(
        &self,
        key: &K,
        reason: impl Into<CancelReason>,
    ) -> Option<Operation<T, E>> {
        let (controller, operation) = {
            let entries = self.inner.entries.read().await;
            let entry = entries.get(key)?;
            (Arc::clone(&entry.controller), entry.operation.clone())
        };
        controller.cancel_with(reason);
        Some(operation)
    }

    /// Cancels every operation with the configured clear reason.
    pub async fn clear_all(&self) {
        self.clear_all_with(self.inner.config.clear_reason.clone())
            .await;
    }

    /// Cancels every operation with `reason`, one at a time, until the
    /// registry is empty.
    ///
    /// Operations registered while draining are cancelled too.
    pub async fn clear_all_with(&self, reason: impl Into<CancelReason>) {
        let reason = reason.into();
        loop {
            let first = {
                let entries = self.inner.entries.read().await;
                entries
                    .values()
                    .next()
                    .map(|e| (Arc::clone(&e.controller), e.operation.clone()))
            };
            let Some((controller, operation)) = first else {
                break;
            };
            controller.cancel_with(reason.clone());
            let _ = operation.await;
        }
    }

    /// Spawns the driver of `body` and returns the shared handle.
    ///
    /// The entry removal runs inside the shared future, before the outcome
    /// becomes visible to any awaiter.
    fn drive(
        &self,
        key: K,
        id: u64,
        body: BoxFuture<'static, Outcome<T, E>>,
        signal: Signal,
    ) -> Operation<T, E> {
        let registry: Weak<RegistryInner<K, T, E>> = Arc::downgrade(&self.inner);
        let shared = async move {
            let outcome = body.await;
            if let Some(inner) = registry.upgrade() {
                inner.remove(&key, id).await;
            }
            outcome
        }
        .boxed()
        .shared();

        tokio::spawn(shared.clone());
        Operation::new(shared, signal)
    }
}

impl<K, T, E> RegistryInner<K, T, E>
where
    K: Eq + Hash,
{
    /// Removes the entry under `key` if it is still the one with `id`.
    async fn remove(&self, key: &K, id: u64) {
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| e.id == id) {
            entries.remove(key);
        }
    }
}

impl<K, T, E> Default for OperationRegistry<K, T, E>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::from_valid(RegistryConfig::default())
    }
}

impl<K, T, E> Clone for OperationRegistry<K, T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, T, E> fmt::Debug for OperationRegistry<K, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Activation;
    use crate::signal::Strategy;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::Mutex;
    use std::time::Duration;

    type Registry = OperationRegistry<&'static str, u32, String>;

    fn after(ms: u64, value: u32) -> impl Future<Output = Result<u32, String>> + Send + 'static {
        async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(value)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_returns_live_operation() {
        let reg = Registry::default();
        let called = Arc::new(AtomicBool::new(false));

        let first = reg.register("k", |_| after(10, 1)).await.unwrap();
        let flag = called.clone();
        let second = reg
            .register_with("k", RegisterMode::Skip, move |_| {
                flag.store(true, Ordering::SeqCst);
                after(0, 2)
            })
            .await
            .unwrap();

        assert!(second.signal().is_same(first.signal()));
        assert_eq!(second.await, Outcome::Value(1));
        assert!(!called.load(Ordering::SeqCst));
        assert!(reg.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_warn_behaves_like_skip() {
        let reg = Registry::default();
        let first = reg.register("k", |_| after(10, 1)).await.unwrap();
        let second = reg
            .register_with("k", RegisterMode::Warn, |_| after(0, 2))
            .await
            .unwrap();
        assert!(second.signal().is_same(first.signal()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throw_leaves_live_entry_untouched() {
        let reg = Registry::default();
        let first = reg.register("k", |_| after(10, 1)).await.unwrap();
        let err = reg
            .register_with("k", RegisterMode::Throw, |_| after(0, 2))
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "registry_key_occupied");
        assert!(!first.signal().is_cancelled());
        assert_eq!(first.await, Outcome::Value(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_cancels_then_runs_after_settle() {
        let reg = Registry::default();
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = reg.register("k", |_| after(1_000, 1)).await.unwrap();
        let log = order.clone();
        let watch = first.clone();
        let second = reg
            .register_with("k", RegisterMode::Replace, move |_| {
                log.lock().unwrap().push(("factory", watch.is_settled()));
                after(10, 2)
            })
            .await
            .unwrap();

        assert_eq!(first.signal().reason(), Some(CancelReason::replaced()));
        assert_eq!(first.await, Outcome::Aborted("Replaced".into()));
        assert_eq!(second.await, Outcome::Value(2));
        assert_eq!(*order.lock().unwrap(), vec![("factory", true)]);
        assert!(reg.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_waits_and_swallows_failure() {
        let reg = Registry::default();
        let first = reg
            .register("k", |_| async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Err::<u32, String>("first failed".into())
            })
            .await
            .unwrap();
        let started = Arc::new(AtomicBool::new(false));
        let flag = started.clone();
        let second = reg
            .register_with("k", RegisterMode::Queue, move |_| {
                flag.store(true, Ordering::SeqCst);
                after(0, 2)
            })
            .await
            .unwrap();

        assert!(!started.load(Ordering::SeqCst));
        assert!(!first.signal().is_cancelled());
        assert_eq!(first.await, Outcome::Error("first failed".to_string()));
        assert_eq!(second.await, Outcome::Value(2));
        assert!(started.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cancels_and_removes() {
        let reg = Registry::default();
        reg.register("k", |_| after(1_000, 1)).await.unwrap();
        assert!(reg.contains(&"k").await);

        let op = reg.clear(&"k").await.unwrap();
        assert_eq!(op.await, Outcome::Aborted("Cancelled".into()));
        assert!(!reg.contains(&"k").await);
        assert!(reg.clear(&"k").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleared_queue_successor_never_runs() {
        let reg = Registry::default();
        reg.register("k", |_| after(50, 1)).await.unwrap();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let next = reg
            .register_with("k", RegisterMode::Queue, move |_| {
                flag.store(true, Ordering::SeqCst);
                after(0, 2)
            })
            .await
            .unwrap();
        let _ = reg.clear_with(&"k", "stop").await;
        assert_eq!(next.await, Outcome::Aborted("stop".into()));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_all_drains_everything() {
        let reg: OperationRegistry<(&'static str, u32), u32, String> = OperationRegistry::default();
        let mut ops = Vec::new();
        for id in 0..3 {
            ops.push(reg.register(("user", id), |_| after(1_000, 0)).await.unwrap());
        }
        assert_eq!(reg.len().await, 3);

        reg.clear_all_with("shutdown").await;
        assert!(reg.is_empty().await);
        for op in ops {
            assert_eq!(op.peek(), Some(&Outcome::Aborted("shutdown".into())));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_strategy_dismisses_cleared_operation() {
        let reg = Registry::new(RegistryConfig {
            strategy: Strategy::Resolve,
            ..RegistryConfig::default()
        })
        .unwrap();
        let op = reg.register("k", |_| after(1_000, 1)).await.unwrap();
        let _ = reg.clear(&"k").await;
        assert_eq!(op.await, Outcome::Dismissed);
    }

    #[test]
    fn test_never_strategy_is_refused() {
        let err = Registry::new(RegistryConfig {
            strategy: Strategy::Never,
            ..RegistryConfig::default()
        })
        .unwrap_err();
        assert_eq!(err.as_label(), "config_unsupported_strategy");
    }

    #[derive(Default)]
    struct Feed {
        activation: Activation,
        stopped: AtomicUsize,
    }

    impl Activable for Feed {
        fn activation(&self) -> &Activation {
            &self.activation
        }

        fn on_deactivate(&self) -> crate::registry::HookResult {
            self.stopped.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_activable_settles_when_resource_goes_inactive() {
        let reg: OperationRegistry<&'static str, (), String> = OperationRegistry::default();
        let feed = Arc::new(Feed::default());
        let handle = feed.clone();
        let op = reg
            .register_activable("feed", RegisterMode::Throw, move |_| handle)
            .await
            .unwrap();
        assert!(feed.is_active());

        feed.deactivate();
        assert_eq!(op.await, Outcome::Value(()));
        assert!(reg.is_empty().await);
    }

    #[tokio::test]
    async fn test_activable_deactivated_on_clear() {
        let reg: OperationRegistry<&'static str, (), String> = OperationRegistry::default();
        let feed = Arc::new(Feed::default());
        let handle = feed.clone();
        let op = reg
            .register_activable("feed", RegisterMode::Throw, move |_| handle)
            .await
            .unwrap();

        let _ = reg.clear(&"feed").await;
        assert!(!feed.is_active());
        assert_eq!(feed.stopped.load(Ordering::SeqCst), 1);
        assert!(op.await.is_cancelled());
    }

    #[tokio::test]
    async fn test_register_job() {
        let reg = Registry::default();
        let job = crate::job::JobFn::arc("answer", |_signal: Signal| async { Ok::<u32, String>(42) });
        let op = reg.register_job("job", RegisterMode::Skip, job).await.unwrap();
        assert_eq!(op.await, Outcome::Value(42));
    }
}
