//! Change notification from the text source
//!
//! Hosts adapt their own signals (input events, scroll events, resize
//! observers, font loading) to [`ChangeNotifier`]. [`NotifierHub`] is a
//! plain in-process implementation.

use parking_lot::Mutex;
use std::sync::Arc;

/// What changed on the text source
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Text,
    Scroll,
    Resize,
    Fonts,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type ChangeCallback = Box<dyn FnMut(ChangeKind) + Send>;

pub trait ChangeNotifier: Send + Sync {
    fn subscribe(&self, kind: ChangeKind, callback: ChangeCallback) -> SubscriptionId;
    /// Returns false when the subscription was already gone
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

struct Subscription {
    id: SubscriptionId,
    kind: ChangeKind,
    callback: Arc<Mutex<ChangeCallback>>,
}

#[derive(Default)]
struct HubInner {
    subscriptions: Vec<Subscription>,
    next_id: u64,
}

/// Fan-out of change events to subscribers
#[derive(Default)]
pub struct NotifierHub {
    inner: Mutex<HubInner>,
}

impl NotifierHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `kind` to every matching subscriber
    ///
    /// Callbacks run outside the hub lock, so a callback may emit again.
    pub fn emit(&self, kind: ChangeKind) -> usize {
        let callbacks: Vec<_> = self
            .inner
            .lock()
            .subscriptions
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| s.callback.clone())
            .collect();

        for callback in &callbacks {
            // A callback already running further up the stack is skipped
            if let Some(mut guard) = callback.try_lock() {
                let callback: &mut ChangeCallback = &mut guard;
                callback(kind);
            }
        }
        callbacks.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscriptions.len()
    }
}

impl ChangeNotifier for NotifierHub {
    fn subscribe(&self, kind: ChangeKind, callback: ChangeCallback) -> SubscriptionId {
        let mut inner = self.inner.lock();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.subscriptions.push(Subscription {
            id,
            kind,
            callback: Arc::new(Mutex::new(callback)),
        });
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.subscriptions.len();
        inner.subscriptions.retain(|s| s.id != id);
        inner.subscriptions.len() != before
    }
}
