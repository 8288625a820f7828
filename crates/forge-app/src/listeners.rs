//! Listener registration.
//!
//! Listeners are stored as `Arc`s and removed by pointer identity, so a
//! cancellation never shifts another listener's position. Callers invoke a
//! snapshot taken under the lock; the lock is never held while user code runs.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::lock;
use crate::panic::{recover, PanicPolicy};

type Callback<E> = Box<dyn Fn(&E) + Send + Sync>;

/// A registered callback
pub struct Listener<E> {
    active: AtomicBool,
    callback: Callback<E>,
}

impl<E> Listener<E> {
    /// Call the listener unless it has been cancelled.
    pub fn invoke(&self, event: &E) {
        if self.active.load(Ordering::SeqCst) {
            (self.callback)(event);
        }
    }
}

/// Invoke each listener under its own [`recover`], so one panicking listener
/// does not keep the rest from running.
fn invoke_each<E>(listeners: &[Arc<Listener<E>>], policy: &PanicPolicy, event: &E) {
    for listener in listeners {
        recover(policy, || listener.invoke(event));
    }
}

type ListenerVec<E> = Mutex<Vec<Arc<Listener<E>>>>;

/// Ordered set of listeners for one event
pub struct Listeners<E> {
    inner: Arc<ListenerVec<E>>,
}

impl<E: 'static> Listeners<E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn add(&self, callback: impl Fn(&E) + Send + Sync + 'static) -> Subscription {
        let listener = Arc::new(Listener {
            active: AtomicBool::new(true),
            callback: Box::new(callback),
        });
        lock(&self.inner).push(listener.clone());

        let list: Weak<ListenerVec<E>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            listener.active.store(false, Ordering::SeqCst);
            if let Some(list) = list.upgrade() {
                lock(&list).retain(|l| !Arc::ptr_eq(l, &listener));
            }
        })
    }

    /// Listeners registered at this instant
    pub fn snapshot(&self) -> Vec<Arc<Listener<E>>> {
        lock(&self.inner).clone()
    }

    /// Call every listener in registration order on the current thread
    pub fn emit(&self, event: &E) {
        for listener in self.snapshot() {
            listener.invoke(event);
        }
    }

    /// Like [`Listeners::emit`], with each listener isolated by `policy`
    pub fn emit_isolated(&self, policy: &PanicPolicy, event: &E) {
        invoke_each(&self.snapshot(), policy, event);
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let drained: Vec<_> = lock(&self.inner).drain(..).collect();
        for listener in drained {
            listener.active.store(false, Ordering::SeqCst);
        }
    }
}

impl<E: 'static> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Listeners keyed by event type
pub struct ListenerMap<K, E> {
    inner: Mutex<HashMap<K, Listeners<E>>>,
}

impl<K: Eq + Hash + Clone, E: 'static> ListenerMap<K, E> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn add(&self, key: K, callback: impl Fn(&E) + Send + Sync + 'static) -> Subscription {
        let mut map = lock(&self.inner);
        map.entry(key).or_default().add(callback)
    }

    pub fn snapshot(&self, key: &K) -> Vec<Arc<Listener<E>>> {
        lock(&self.inner)
            .get(key)
            .map(Listeners::snapshot)
            .unwrap_or_default()
    }

    pub fn emit_isolated(&self, key: &K, policy: &PanicPolicy, event: &E) {
        invoke_each(&self.snapshot(key), policy, event);
    }

    pub fn contains(&self, key: &K) -> bool {
        lock(&self.inner)
            .get(key)
            .is_some_and(|listeners| !listeners.is_empty())
    }

    pub fn clear(&self) {
        let drained: Vec<_> = lock(&self.inner).drain().collect();
        for (_, listeners) in drained {
            listeners.clear();
        }
    }
}

impl<K: Eq + Hash + Clone, E: 'static> Default for ListenerMap<K, E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by every listener registration.
///
/// Dropping it does not unregister; call [`Subscription::cancel`]. Cancelling
/// twice, or from inside the listener itself, is fine.
#[derive(Clone)]
pub struct Subscription {
    cancel: Arc<dyn Fn() + Send + Sync>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Arc::new(cancel),
        }
    }

    pub fn cancel(&self) {
        (self.cancel)();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Subscription")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_emit_reaches_every_listener() {
        let listeners = Listeners::<u32>::new();
        let total = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let total = total.clone();
            listeners.add(move |n| {
                total.fetch_add(*n as usize, Ordering::SeqCst);
            });
        }
        listeners.emit(&2);
        assert_eq!(total.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let listeners = Listeners::<()>::new();
        let sub = listeners.add(|_| {});
        let _other = listeners.add(|_| {});
        sub.cancel();
        sub.cancel();
        assert_eq!(listeners.len(), 1);
    }

    #[test]
    fn test_cancel_from_inside_callback() {
        let listeners = Arc::new(Listeners::<()>::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let sub = listeners.add({
            let calls = calls.clone();
            let slot = slot.clone();
            move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                if let Some(sub) = slot.lock().unwrap().as_ref() {
                    sub.cancel();
                }
            }
        });
        *slot.lock().unwrap() = Some(sub);

        listeners.emit(&());
        listeners.emit(&());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(listeners.is_empty());
    }

    #[test]
    fn test_cancelled_listener_in_snapshot_is_skipped() {
        let listeners = Listeners::<()>::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let sub = listeners.add({
            let calls = calls.clone();
            move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            }
        });

        let snapshot = listeners.snapshot();
        sub.cancel();
        for listener in snapshot {
            listener.invoke(&());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_panicking_listener_does_not_stop_the_rest() {
        let listeners = Listeners::<u32>::new();
        let panics = Arc::new(AtomicUsize::new(0));
        let policy = PanicPolicy::new(Some(Arc::new({
            let panics = panics.clone();
            move |_| {
                panics.fetch_add(1, Ordering::SeqCst);
            }
        })));
        let total = Arc::new(AtomicUsize::new(0));
        listeners.add(|_| panic!("listener exploded"));
        listeners.add({
            let total = total.clone();
            move |n| {
                total.fetch_add(*n as usize, Ordering::SeqCst);
            }
        });

        listeners.emit_isolated(&policy, &1);
        listeners.emit_isolated(&policy, &2);
        assert_eq!(total.load(Ordering::SeqCst), 3);
        assert_eq!(panics.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_listener_map_keys_are_independent() {
        let map = ListenerMap::<&'static str, ()>::new();
        let _a = map.add("focus", |_| {});
        let b = map.add("blur", |_| {});
        assert!(map.contains(&"focus"));
        assert!(map.contains(&"blur"));

        b.cancel();
        assert!(!map.contains(&"blur"));
        assert_eq!(map.snapshot(&"focus").len(), 1);

        map.clear();
        assert!(map.snapshot(&"focus").is_empty());
    }
}
