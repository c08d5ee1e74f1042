//! Ordered listener registry.
//!
//! Callbacks registered on a channel are invoked synchronously, in
//! registration order, exactly once per dispatched event. Registration
//! returns a `Subscription` token that can remove the callback later.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Monotonically increasing listener ids, shared by every set.
static LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Token returned from a listener registration; pass it back to `remove`
/// (or a channel's `unsubscribe`) to drop the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription(u64);

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// An ordered set of callbacks for one event category.
pub struct ListenerSet<T> {
    entries: Mutex<Vec<(u64, Callback<T>)>>,
}

impl<T> ListenerSet<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Append a callback. Insertion order is invocation order.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = LISTENER_ID.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().unwrap().push((id, Arc::new(callback)));
        Subscription(id)
    }

    /// Remove a previously registered callback. Returns false when the
    /// token does not belong to this set.
    pub fn remove(&self, subscription: &Subscription) -> bool {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|(id, _)| *id != subscription.0);
        entries.len() != before
    }

    /// Drop every callback.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every callback with `event`, in registration order. The entry
    /// list is snapshotted first, so a callback may subscribe to or remove
    /// from the same set without deadlocking; such changes take effect from
    /// the next dispatch.
    pub fn dispatch(&self, event: &T) {
        let snapshot: Vec<Callback<T>> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in snapshot {
            callback(event);
        }
    }
}

impl<T> Default for ListenerSet<T> {
    fn default() -> Self {
        Self::new()
    }
}
