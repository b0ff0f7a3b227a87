//! Listener fan-out with snapshot semantics

use parking_lot::Mutex;
use std::sync::Arc;

/// Identity by data pointer only: `Arc::ptr_eq` on trait objects also
/// compares vtable pointers, which are not stable across coercion sites.
fn same_target<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// An unordered set of listeners, notified from a snapshot so that
/// registrations made during a notification are not delivered that same
/// event. Removal is keyed by `Arc` identity.
pub struct ListenerSet<T: ?Sized> {
    entries: Mutex<Vec<Arc<T>>>,
}

impl<T: ?Sized> Default for ListenerSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> ListenerSet<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Register a listener. Registering the same `Arc` twice is a no-op.
    pub fn add(&self, listener: Arc<T>) {
        let mut entries = self.entries.lock();
        if !entries.iter().any(|e| same_target(e, &listener)) {
            entries.push(listener);
        }
    }

    /// Remove a listener by identity. Returns whether it was present.
    pub fn remove(&self, listener: &Arc<T>) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| !same_target(e, listener));
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Current listeners at this instant. The lock is released before the
    /// caller iterates, so listener callbacks may re-enter `add`/`remove`.
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.entries.lock().clone()
    }

    /// Invoke `f` on a snapshot of the current listeners.
    pub fn notify(&self, mut f: impl FnMut(&T)) {
        for listener in self.snapshot() {
            f(&listener);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        hits: AtomicUsize,
    }

    impl Counter {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                hits: AtomicUsize::new(0),
            })
        }
    }

    #[test]
    fn add_is_idempotent_and_remove_by_identity() {
        let set: ListenerSet<Counter> = ListenerSet::new();
        let a = Counter::new();
        set.add(a.clone());
        set.add(a.clone());
        assert_eq!(set.len(), 1);
        assert!(set.remove(&a));
        assert!(!set.remove(&a));
        assert!(set.is_empty());
    }

    #[test]
    fn listener_added_during_notify_misses_that_event() {
        let set: Arc<ListenerSet<Counter>> = Arc::new(ListenerSet::new());
        let first = Counter::new();
        let late = Counter::new();
        set.add(first.clone());

        let set2 = set.clone();
        let late2 = late.clone();
        set.notify(|c| {
            c.hits.fetch_add(1, Ordering::SeqCst);
            // registration mid-notify lands in the set but not this round
            set2.add(late2.clone());
        });

        assert_eq!(first.hits.load(Ordering::SeqCst), 1);
        assert_eq!(late.hits.load(Ordering::SeqCst), 0);
        assert_eq!(set.len(), 2);

        set.notify(|c| {
            c.hits.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(late.hits.load(Ordering::SeqCst), 1);
    }
}
