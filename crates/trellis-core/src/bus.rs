//! Result-collecting event bus.
//!
//! [`ResultBus`] is the listener registry behind pack event propagation and
//! the component build pipeline. Unlike a fire-and-forget emitter, every
//! emission mode collects what the listeners return:
//!
//! - [`emit`](ResultBus::emit) — synchronous, all sync listeners in
//!   registration order, every return value collected.
//! - [`emit_seq`](ResultBus::emit_seq) — sequential: each listener fully
//!   completes before the next starts. Listeners that mutate a shared
//!   payload (through its interior mutability) can rely on seeing every
//!   earlier listener's writes.
//! - [`emit_parallel`](ResultBus::emit_parallel) — all listeners
//!   concurrently; results come back in registration order regardless of
//!   completion order.
//! - [`emit_until`](ResultBus::emit_until) / [`emit_until_seq`](ResultBus::emit_until_seq)
//!   — stop at the first listener returning `Some`.
//!
//! Listeners are held in an arena keyed by monotonically increasing handles,
//! so iteration order is registration order and [`off`](ResultBus::off)
//! removes by handle without scanning. One-shot listeners registered via
//! `once`/`once_async` are removed after the emission that fired them
//! completes, in every mode.
//!
//! # Cheap Cloning
//!
//! `ResultBus` uses an internal `Arc`, so clones are handles onto the same
//! listener registry. The root orchestrator relies on this when caching
//! per-pack buses in its flattened view.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::{BoxFuture, join_all};
use parking_lot::Mutex;
use tracing::trace;

/// Stable identifier for one registered listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerHandle(u64);

type SyncFn<P, V> = Arc<dyn Fn(&P) -> Option<V> + Send + Sync>;
type AsyncFn<P, V> = Arc<dyn Fn(Arc<P>) -> BoxFuture<'static, Option<V>> + Send + Sync>;

enum Callback<P, V> {
    Sync(SyncFn<P, V>),
    Async(AsyncFn<P, V>),
}

impl<P, V> Clone for Callback<P, V> {
    fn clone(&self) -> Self {
        match self {
            Self::Sync(f) => Self::Sync(Arc::clone(f)),
            Self::Async(f) => Self::Async(Arc::clone(f)),
        }
    }
}

struct ListenerEntry<P, V> {
    callback: Callback<P, V>,
    once: bool,
}

struct BusInner<P, V> {
    next_handle: u64,
    listeners: BTreeMap<u64, ListenerEntry<P, V>>,
}

/// A typed event bus that collects listener results.
pub struct ResultBus<P, V> {
    inner: Arc<Mutex<BusInner<P, V>>>,
}

impl<P, V> Clone for ResultBus<P, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P, V> Default for ResultBus<P, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, V> ResultBus<P, V> {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(BusInner {
                next_handle: 0,
                listeners: BTreeMap::new(),
            })),
        }
    }

    fn insert(&self, callback: Callback<P, V>, once: bool) -> ListenerHandle {
        let mut inner = self.inner.lock();
        let handle = inner.next_handle;
        inner.next_handle += 1;
        inner
            .listeners
            .insert(handle, ListenerEntry { callback, once });
        ListenerHandle(handle)
    }

    /// Removes a listener by handle. Returns `false` if it was already gone.
    pub fn off(&self, handle: ListenerHandle) -> bool {
        self.inner.lock().listeners.remove(&handle.0).is_some()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    /// Returns `true` if no listeners are registered.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().listeners.is_empty()
    }

    /// Removes every listener.
    pub fn clear(&self) {
        self.inner.lock().listeners.clear();
    }

    /// Snapshot of the current listeners in registration order.
    ///
    /// Emission never holds the lock while invoking listeners, so listeners
    /// may freely register or remove others; changes take effect on the next
    /// emission.
    fn snapshot(&self) -> Vec<(u64, bool, Callback<P, V>)> {
        self.inner
            .lock()
            .listeners
            .iter()
            .map(|(handle, entry)| (*handle, entry.once, entry.callback.clone()))
            .collect()
    }

    fn remove_fired(&self, fired: &[u64]) {
        if fired.is_empty() {
            return;
        }
        let mut inner = self.inner.lock();
        for handle in fired {
            inner.listeners.remove(handle);
        }
    }
}

impl<P: Send + Sync + 'static, V: Send + 'static> ResultBus<P, V> {
    /// Registers a synchronous listener.
    pub fn on(&self, f: impl Fn(&P) -> Option<V> + Send + Sync + 'static) -> ListenerHandle {
        self.insert(Callback::Sync(Arc::new(f)), false)
    }

    /// Registers a synchronous listener that is removed after it first fires.
    pub fn once(&self, f: impl Fn(&P) -> Option<V> + Send + Sync + 'static) -> ListenerHandle {
        self.insert(Callback::Sync(Arc::new(f)), true)
    }

    /// Registers an asynchronous listener.
    pub fn on_async<F, Fut>(&self, f: F) -> ListenerHandle
    where
        F: Fn(Arc<P>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<V>> + Send + 'static,
    {
        let callback: AsyncFn<P, V> =
            Arc::new(move |payload| -> BoxFuture<'static, Option<V>> { Box::pin(f(payload)) });
        self.insert(Callback::Async(callback), false)
    }

    /// Registers an asynchronous listener that is removed after it first fires.
    pub fn once_async<F, Fut>(&self, f: F) -> ListenerHandle
    where
        F: Fn(Arc<P>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<V>> + Send + 'static,
    {
        let callback: AsyncFn<P, V> =
            Arc::new(move |payload| -> BoxFuture<'static, Option<V>> { Box::pin(f(payload)) });
        self.insert(Callback::Async(callback), true)
    }

    /// Invokes all sync listeners in registration order, collecting results.
    ///
    /// Async listeners cannot run inside a synchronous emission; they are
    /// skipped with a trace log and keep their one-shot status.
    pub fn emit(&self, payload: &Arc<P>) -> Vec<Option<V>> {
        let mut results = Vec::new();
        let mut fired = Vec::new();
        for (handle, once, callback) in self.snapshot() {
            match callback {
                Callback::Sync(f) => {
                    results.push(f(payload));
                    if once {
                        fired.push(handle);
                    }
                }
                Callback::Async(_) => {
                    trace!(handle, "async listener skipped by sync emission");
                }
            }
        }
        self.remove_fired(&fired);
        results
    }

    /// Invokes every listener strictly sequentially, collecting results.
    ///
    /// Each listener — sync or async — fully completes before the next one
    /// starts.
    pub async fn emit_seq(&self, payload: &Arc<P>) -> Vec<Option<V>> {
        let mut results = Vec::new();
        let mut fired = Vec::new();
        for (handle, once, callback) in self.snapshot() {
            let result = match callback {
                Callback::Sync(f) => f(payload),
                Callback::Async(f) => f(Arc::clone(payload)).await,
            };
            results.push(result);
            if once {
                fired.push(handle);
            }
        }
        self.remove_fired(&fired);
        results
    }

    /// Invokes every listener concurrently and awaits them all.
    ///
    /// Results come back in registration order regardless of completion
    /// order.
    pub async fn emit_parallel(&self, payload: &Arc<P>) -> Vec<Option<V>> {
        let snapshot = self.snapshot();
        let futures: Vec<BoxFuture<'static, Option<V>>> = snapshot
            .iter()
            .map(|(_, _, callback)| match callback {
                Callback::Sync(f) => {
                    let f = Arc::clone(f);
                    let payload = Arc::clone(payload);
                    Box::pin(async move { f(&payload) }) as BoxFuture<'static, Option<V>>
                }
                Callback::Async(f) => f(Arc::clone(payload)),
            })
            .collect();
        let results = join_all(futures).await;

        let fired: Vec<u64> = snapshot
            .iter()
            .filter(|(_, once, _)| *once)
            .map(|(handle, _, _)| *handle)
            .collect();
        self.remove_fired(&fired);
        results
    }

    /// Invokes sync listeners in order, stopping at the first `Some`.
    pub fn emit_until(&self, payload: &Arc<P>) -> Option<V> {
        let mut fired = Vec::new();
        let mut found = None;
        for (handle, once, callback) in self.snapshot() {
            match callback {
                Callback::Sync(f) => {
                    let result = f(payload);
                    if once {
                        fired.push(handle);
                    }
                    if result.is_some() {
                        found = result;
                        break;
                    }
                }
                Callback::Async(_) => {
                    trace!(handle, "async listener skipped by sync emission");
                }
            }
        }
        self.remove_fired(&fired);
        found
    }

    /// Invokes listeners sequentially, stopping at the first `Some`.
    pub async fn emit_until_seq(&self, payload: &Arc<P>) -> Option<V> {
        let mut fired = Vec::new();
        let mut found = None;
        for (handle, once, callback) in self.snapshot() {
            let result = match callback {
                Callback::Sync(f) => f(payload),
                Callback::Async(f) => f(Arc::clone(payload)).await,
            };
            if once {
                fired.push(handle);
            }
            if result.is_some() {
                found = result;
                break;
            }
        }
        self.remove_fired(&fired);
        found
    }
}

impl<P, V> std::fmt::Debug for ResultBus<P, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultBus")
            .field("listeners", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_emit_collects_in_registration_order() {
        let bus: ResultBus<(), i32> = ResultBus::new();
        bus.on(|_| Some(1));
        bus.on(|_| None);
        bus.on(|_| Some(3));

        let results = bus.emit(&Arc::new(()));
        assert_eq!(results, vec![Some(1), None, Some(3)]);
    }

    #[test]
    fn test_once_removed_after_emission() {
        let bus: ResultBus<(), i32> = ResultBus::new();
        bus.once(|_| Some(1));
        bus.on(|_| Some(2));

        assert_eq!(bus.emit(&Arc::new(())), vec![Some(1), Some(2)]);
        assert_eq!(bus.emit(&Arc::new(())), vec![Some(2)]);
    }

    #[test]
    fn test_off_by_handle() {
        let bus: ResultBus<(), i32> = ResultBus::new();
        let first = bus.on(|_| Some(1));
        bus.on(|_| Some(2));

        assert!(bus.off(first));
        assert!(!bus.off(first));
        assert_eq!(bus.emit(&Arc::new(())), vec![Some(2)]);
    }

    #[test]
    fn test_sync_emit_skips_async_listeners() {
        let bus: ResultBus<(), i32> = ResultBus::new();
        bus.on(|_| Some(1));
        bus.on_async(|_| async { Some(2) });

        assert_eq!(bus.emit(&Arc::new(())), vec![Some(1)]);
        assert_eq!(bus.len(), 2);
    }

    #[tokio::test]
    async fn test_emit_seq_runs_async_listeners() {
        let bus: ResultBus<(), i32> = ResultBus::new();
        bus.on(|_| Some(1));
        bus.on_async(|_| async { Some(2) });

        assert_eq!(bus.emit_seq(&Arc::new(())).await, vec![Some(1), Some(2)]);
    }

    #[tokio::test]
    async fn test_emit_seq_later_listeners_see_earlier_mutations() {
        struct Pipeline {
            steps: Mutex<Vec<&'static str>>,
        }

        let bus: ResultBus<Pipeline, usize> = ResultBus::new();
        bus.on_async(|p: Arc<Pipeline>| async move {
            p.steps.lock().push("first");
            None
        });
        bus.on_async(|p: Arc<Pipeline>| async move {
            // Depends on the mutation the first listener made.
            Some(p.steps.lock().len())
        });

        let payload = Arc::new(Pipeline {
            steps: Mutex::new(Vec::new()),
        });
        let results = bus.emit_seq(&payload).await;
        assert_eq!(results, vec![None, Some(1)]);
    }

    #[tokio::test]
    async fn test_emit_parallel_preserves_registration_order() {
        let bus: ResultBus<(), i32> = ResultBus::new();
        bus.on_async(|_| async {
            tokio::task::yield_now().await;
            Some(1)
        });
        bus.on_async(|_| async { Some(2) });
        bus.on(|_| Some(3));

        let results = bus.emit_parallel(&Arc::new(())).await;
        assert_eq!(results, vec![Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn test_emit_until_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));

        let bus: ResultBus<(), i32> = ResultBus::new();
        let c = Arc::clone(&calls);
        bus.on(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            None
        });
        let c = Arc::clone(&calls);
        bus.on(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Some(42)
        });
        let c = Arc::clone(&calls);
        bus.on(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Some(99)
        });

        assert_eq!(bus.emit_until(&Arc::new(())), Some(42));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_emit_until_seq_consumes_only_fired_once_listeners() {
        let bus: ResultBus<(), i32> = ResultBus::new();
        bus.once(|_| Some(1));
        bus.once(|_| Some(2));

        assert_eq!(bus.emit_until_seq(&Arc::new(())).await, Some(1));
        // The second one-shot never fired and must still be registered.
        assert_eq!(bus.len(), 1);
        assert_eq!(bus.emit_until_seq(&Arc::new(())).await, Some(2));
        assert!(bus.is_empty());
    }

    #[test]
    fn test_clones_share_listeners() {
        let bus: ResultBus<(), i32> = ResultBus::new();
        let clone = bus.clone();
        bus.on(|_| Some(7));

        assert_eq!(clone.emit(&Arc::new(())), vec![Some(7)]);
    }
}
