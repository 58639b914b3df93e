//! Named-event pub/sub used by the server and by every namespace
//!
//! An [`EventEmitter`] maps event names to listener lists. Listeners are
//! plain closures over a payload type `A`; the server fires
//! `EventEmitter<Arc<NameSpace>>`, namespaces fire `EventEmitter<Vec<Value>>`.
//!
//! # Architecture
//!
//! ```text
//! on("news", f) ──┐
//! once("news", g) ┼──▶ listeners["news"] ──fire("news", args)──▶ f(args), g(args)
//!                 │                                               (g removed first)
//! remove_listener(id) ──▶ drops one registration
//! ```
//!
//! Listeners are snapshotted under the lock and invoked after it is released,
//! so a listener may register or remove listeners on the same emitter.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Handle returned by [`EventEmitter::on`] / [`EventEmitter::once`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<A> = Arc<dyn Fn(A) + Send + Sync>;

struct Registration<A> {
    id: ListenerId,
    once: bool,
    listener: Listener<A>,
}

impl<A> Clone for Registration<A> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            once: self.once,
            listener: self.listener.clone(),
        }
    }
}

/// Thread-safe named-event emitter
pub struct EventEmitter<A> {
    listeners: RwLock<HashMap<String, Vec<Registration<A>>>>,
    next_id: AtomicU64,
}

impl<A: Clone> EventEmitter<A> {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener that runs on every `fire(name, ..)`
    pub fn on<F>(&self, name: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        self.register(name.into(), false, Arc::new(listener))
    }

    /// Register a listener that runs at most once
    pub fn once<F>(&self, name: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        self.register(name.into(), true, Arc::new(listener))
    }

    fn register(&self, name: String, once: bool, listener: Listener<A>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .entry(name)
            .or_default()
            .push(Registration { id, once, listener });
        id
    }

    /// Remove one listener; returns `true` if it was registered under `name`
    pub fn remove_listener(&self, name: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let Some(list) = listeners.get_mut(name) else {
            return false;
        };

        let before = list.len();
        list.retain(|r| r.id != id);
        let removed = list.len() < before;

        if list.is_empty() {
            listeners.remove(name);
        }
        removed
    }

    /// Remove every listener for `name`
    pub fn remove_all_listeners(&self, name: &str) {
        self.listeners.write().remove(name);
    }

    pub fn listener_count(&self, name: &str) -> usize {
        self.listeners.read().get(name).map_or(0, Vec::len)
    }

    /// Invoke every listener registered for `name`
    ///
    /// Returns the number of listeners that ran.
    pub fn fire(&self, name: &str, payload: A) -> usize {
        let snapshot = {
            let mut listeners = self.listeners.write();
            let Some(list) = listeners.get_mut(name) else {
                return 0;
            };
            let snapshot = list.clone();
            list.retain(|r| !r.once);
            if list.is_empty() {
                listeners.remove(name);
            }
            snapshot
        };

        for registration in &snapshot {
            (registration.listener)(payload.clone());
        }
        snapshot.len()
    }
}

impl<A: Clone> Default for EventEmitter<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for EventEmitter<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.read();
        f.debug_struct("EventEmitter")
            .field("events", &listeners.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn(u32) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (count, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_fire_reaches_every_listener() {
        let emitter = EventEmitter::<u32>::new();
        let (a, fa) = counter();
        let (b, fb) = counter();
        emitter.on("news", fa);
        emitter.on("news", fb);

        assert_eq!(emitter.fire("news", 1), 2);
        assert_eq!(emitter.fire("news", 2), 2);
        assert_eq!(a.load(Ordering::SeqCst), 2);
        assert_eq!(b.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_fire_unknown_event_is_noop() {
        let emitter = EventEmitter::<u32>::new();
        assert_eq!(emitter.fire("nothing", 0), 0);
    }

    #[test]
    fn test_once_runs_a_single_time() {
        let emitter = EventEmitter::<u32>::new();
        let (count, f) = counter();
        emitter.once("ready", f);

        assert_eq!(emitter.fire("ready", 0), 1);
        assert_eq!(emitter.fire("ready", 0), 0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(emitter.listener_count("ready"), 0);
    }

    #[test]
    fn test_payload_is_delivered() {
        let emitter = EventEmitter::<String>::new();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let s = seen.clone();
        emitter.on("say", move |word| s.lock().push(word));

        emitter.fire("say", "hello".to_string());
        assert_eq!(*seen.lock(), vec!["hello".to_string()]);
    }

    #[test]
    fn test_remove_listener_by_id() {
        let emitter = EventEmitter::<u32>::new();
        let (count, f) = counter();
        let (_, g) = counter();
        let id = emitter.on("tick", f);
        emitter.on("tick", g);

        assert!(emitter.remove_listener("tick", id));
        assert!(!emitter.remove_listener("tick", id));
        assert!(!emitter.remove_listener("other", id));

        emitter.fire("tick", 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(emitter.listener_count("tick"), 1);
    }

    #[test]
    fn test_remove_all_listeners() {
        let emitter = EventEmitter::<u32>::new();
        let (count, f) = counter();
        emitter.on("tick", f);
        emitter.remove_all_listeners("tick");

        assert_eq!(emitter.fire("tick", 0), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_listener_may_register_during_fire() {
        let emitter = Arc::new(EventEmitter::<u32>::new());
        let inner = emitter.clone();
        emitter.on("outer", move |_| {
            inner.on("late", |_| {});
        });

        emitter.fire("outer", 0);
        assert_eq!(emitter.listener_count("late"), 1);
    }

    #[test]
    fn test_concurrent_registration_keeps_every_listener() {
        let emitter = Arc::new(EventEmitter::<u32>::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let emitter = emitter.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        emitter.on("evt", |_| {});
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(emitter.listener_count("evt"), 400);
    }
}
