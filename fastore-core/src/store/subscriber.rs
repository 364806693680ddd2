//! Subscriber types for the store engine.
//!
//! A subscriber is a zero-argument callback registered with one engine.
//! Subscribers are compared by identity: the `Arc` that holds the callback,
//! never the callback's behaviour.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use super::engine::EngineInner;
use crate::state::State;

/// Shared notification callback.
pub type Notify = Arc<dyn Fn() + Send + Sync>;

/// Key of one entry in an engine's subscriber set.
///
/// An ID is assigned when a callback is added to the set and is what a
/// [`Subscription`] uses to remove that entry again. Two closures with the
/// same behaviour still get distinct IDs, so removing one never touches the
/// other. Bindings expose their ID through `Binding::subscriber_id`, which
/// is also the `subscriber` field on the store's log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Draw the next ID from a process-wide counter.
    ///
    /// IDs are unique across every engine and thread in the process, so an
    /// ID taken from one store can never name an entry in another.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Same as [`SubscriberId::new`]: a default ID is a fresh one.
impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// An entry in an engine's subscriber set.
pub(crate) struct Subscriber {
    id: SubscriberId,
    notify: Notify,
}

impl Subscriber {
    pub(crate) fn new(notify: Notify) -> Self {
        Self {
            id: SubscriberId::new(),
            notify,
        }
    }

    pub(crate) fn id(&self) -> SubscriberId {
        self.id
    }

    pub(crate) fn notify_fn(&self) -> &Notify {
        &self.notify
    }

    /// Whether this entry holds exactly `callback`.
    pub(crate) fn holds(&self, callback: &Notify) -> bool {
        Arc::ptr_eq(&self.notify, callback)
    }
}

/// Handle returned by `Engine::subscribe`.
///
/// Calling [`unsubscribe`](Self::unsubscribe) removes the entry. The handle
/// does not unsubscribe on drop; bindings that need scoped cleanup do that
/// themselves.
#[must_use = "dropping a Subscription leaves the callback registered"]
pub struct Subscription {
    id: SubscriberId,
    remove: Box<dyn Fn(SubscriberId) + Send + Sync>,
    active: AtomicBool,
}

impl Subscription {
    pub(crate) fn new<S: State>(id: SubscriberId, engine: Weak<EngineInner<S>>) -> Self {
        Self {
            id,
            remove: Box::new(move |id| {
                if let Some(inner) = engine.upgrade() {
                    inner.remove_subscriber(id);
                }
            }),
            active: AtomicBool::new(true),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Remove the callback from the engine. Later calls do nothing.
    pub fn unsubscribe(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            (self.remove)(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn subscriber_identity_is_by_arc() {
        let callback: Notify = Arc::new(|| {});
        let twin: Notify = Arc::new(|| {});

        let subscriber = Subscriber::new(Arc::clone(&callback));
        assert!(subscriber.holds(&callback));
        assert!(!subscriber.holds(&twin));
    }

    #[test]
    fn identical_closures_get_separate_entries() {
        let engine = crate::store::Engine::new(serde_json::json!({}));
        let a = engine.subscribe(|| {});
        let b = engine.subscribe(|| {});
        assert_ne!(a.id(), b.id());

        a.unsubscribe();
        assert!(!a.is_active());
        assert!(b.is_active());
        assert_eq!(engine.subscriber_count(), 1);
    }

    #[test]
    fn default_id_is_fresh() {
        assert_ne!(SubscriberId::default(), SubscriberId::default());
    }
}
