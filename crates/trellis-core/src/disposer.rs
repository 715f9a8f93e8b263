//! One-shot reversal handles returned by registration methods.

use std::sync::Arc;

use parking_lot::Mutex;

/// Reverses exactly one registration when invoked.
///
/// Every registration method on a pack, inspector, or locale store returns a
/// `Disposer`. Calling [`dispose`](Disposer::dispose) removes the resource it
/// guards; calling it again is a no-op. Clones share the same one-shot slot,
/// so a pack can keep a copy for teardown while the caller keeps another.
///
/// Dropping a `Disposer` does **not** run it — teardown is always explicit.
#[derive(Clone)]
pub struct Disposer {
    inner: Arc<Mutex<Option<Box<dyn FnOnce() + Send>>>>,
}

impl Disposer {
    /// Wraps a reversal closure.
    pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(Box::new(f)))),
        }
    }

    /// A disposer that does nothing.
    pub fn noop() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }

    /// Combines several disposers into one that runs them all.
    ///
    /// Disposal order is reverse registration order, so later registrations
    /// are unwound first.
    pub fn merge(mut disposers: Vec<Disposer>) -> Self {
        disposers.reverse();
        Self::new(move || {
            for d in &disposers {
                d.dispose();
            }
        })
    }

    /// Runs the reversal closure if it has not run yet.
    pub fn dispose(&self) {
        let f = self.inner.lock().take();
        if let Some(f) = f {
            f();
        }
    }

    /// Returns `true` once the reversal has run (or never existed).
    pub fn is_disposed(&self) -> bool {
        self.inner.lock().is_none()
    }
}

impl std::fmt::Debug for Disposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disposer")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_dispose_runs_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let disposer = Disposer::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!disposer.is_disposed());
        disposer.dispose();
        disposer.dispose();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(disposer.is_disposed());
    }

    #[test]
    fn test_clones_share_slot() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let disposer = Disposer::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let clone = disposer.clone();

        clone.dispose();
        disposer.dispose();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_merge_reverses_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let a = Arc::clone(&order);
        let b = Arc::clone(&order);
        let merged = Disposer::merge(vec![
            Disposer::new(move || a.lock().push("first")),
            Disposer::new(move || b.lock().push("second")),
        ]);

        merged.dispose();
        assert_eq!(*order.lock(), vec!["second", "first"]);
    }

    #[test]
    fn test_drop_does_not_dispose() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        {
            let _disposer = Disposer::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
