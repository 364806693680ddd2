//! Selector Binding Implementation
//!
//! A binding ties one observer to a projection of the store state.
//!
//! # How Bindings Work
//!
//! 1. On creation the selector runs once against the current snapshot and
//!    the result is stored in the binding.
//!
//! 2. The binding subscribes to its engine. Every notification re-runs the
//!    selector, whatever field the update touched.
//!
//! 3. The fresh projection is compared with the stored one. Only when they
//!    differ is the stored value replaced and the observer's change
//!    callback invoked.
//!
//! 4. Dropping the binding unsubscribes it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use super::reset::Resetter;
use crate::error::StoreError;
use crate::state::State;
use crate::store::{Engine, SubscriberId, Subscription};

type ChangeFn<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// The projected value and bookkeeping owned by one binding.
struct Slot<T> {
    current: RwLock<T>,
    recomputes: AtomicU64,
    changes: AtomicU64,
    on_change: Mutex<Option<ChangeFn<T>>>,
}

impl<T> Slot<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn new(value: T) -> Self {
        Self {
            current: RwLock::new(value),
            recomputes: AtomicU64::new(0),
            changes: AtomicU64::new(0),
            on_change: Mutex::new(None),
        }
    }

    /// Store a freshly computed projection, signalling only on change.
    fn refresh(&self, next: T) {
        self.recomputes.fetch_add(1, Ordering::SeqCst);

        {
            let mut current = self.current.write();
            if *current == next {
                return;
            }
            *current = next.clone();
        }
        self.changes.fetch_add(1, Ordering::SeqCst);

        // Clone out so the callback may touch the binding or the store.
        let on_change = self.on_change.lock().clone();
        if let Some(on_change) = on_change {
            on_change(&next);
        }
    }
}

/// A subscription to one projection of a store.
///
/// # Type Parameters
///
/// - `S`: the store's state shape.
/// - `T`: the projected value. Compared with `PartialEq` to decide whether
///   the observer needs to hear about an update.
///
/// # Example
///
/// ```rust,ignore
/// let first = family.use_selector(&ctx, |s: &Name| s.first.clone())?;
/// first.on_change(|value| println!("first is now {value}"));
///
/// first.set(NamePatch::default().first("Ada"))?;   // prints
/// first.set(NamePatch::default().last("Byron"))?;  // silent
/// ```
pub struct Binding<S: State, T> {
    engine: Engine<S>,
    slot: Arc<Slot<T>>,
    subscription: Subscription,
}

impl<S, T> Binding<S, T>
where
    S: State,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Bind `selector` to `engine` directly, bypassing context lookup.
    pub fn new<F>(engine: &Engine<S>, selector: F) -> Self
    where
        F: Fn(&S) -> T + Send + Sync + 'static,
    {
        let slot = Arc::new(Slot::new(selector(engine.get().as_ref())));

        let weak = engine.downgrade();
        let target = Arc::clone(&slot);
        let subscription = engine.subscribe(move || {
            if let Some(engine) = weak.upgrade() {
                target.refresh(selector(engine.get().as_ref()));
            }
        });
        debug!(subscriber = ?subscription.id(), "selector binding activated");

        Self {
            engine: engine.clone(),
            slot,
            subscription,
        }
    }

    /// The current projected value.
    pub fn get(&self) -> T {
        self.slot.current.read().clone()
    }

    /// Register the observer's re-render callback, replacing any previous
    /// one. It receives the new projection after each actual change.
    pub fn on_change<F>(&self, on_change: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        *self.slot.on_change.lock() = Some(Arc::new(on_change));
    }

    /// The value, the setter and the resetter, in that order.
    pub fn parts(&self) -> (T, Setter<S>, Resetter<S>) {
        (self.get(), self.setter(), self.resetter())
    }

    /// Apply a full-shape patch to the store, whatever this binding projects.
    pub fn set(&self, patch: S::Patch) -> Result<(), StoreError> {
        self.engine.set(patch)
    }

    pub fn reset(&self) -> Result<(), StoreError> {
        self.engine.reset()
    }

    pub fn setter(&self) -> Setter<S> {
        Setter::new(self.engine.clone())
    }

    pub fn resetter(&self) -> Resetter<S> {
        Resetter::new(self.engine.clone())
    }

    /// How many times the selector re-ran in response to notifications.
    pub fn recompute_count(&self) -> u64 {
        self.slot.recomputes.load(Ordering::SeqCst)
    }

    /// How many of those re-runs produced a different value.
    pub fn change_count(&self) -> u64 {
        self.slot.changes.load(Ordering::SeqCst)
    }

    pub fn engine(&self) -> &Engine<S> {
        &self.engine
    }

    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscription.id()
    }
}

impl<S: State, T> Drop for Binding<S, T> {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
        trace!(subscriber = ?self.subscription.id(), "selector binding released");
    }
}

impl<S, T> std::fmt::Debug for Binding<S, T>
where
    S: State,
    T: Clone + PartialEq + Send + Sync + std::fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("value", &self.get())
            .field("recomputes", &self.recompute_count())
            .field("changes", &self.change_count())
            .finish()
    }
}

/// The store's update operation, detached from any binding.
pub struct Setter<S: State> {
    engine: Engine<S>,
}

impl<S: State> Setter<S> {
    pub(crate) fn new(engine: Engine<S>) -> Self {
        Self { engine }
    }

    pub fn set(&self, patch: S::Patch) -> Result<(), StoreError> {
        self.engine.set(patch)
    }
}

impl<S: State> Clone for Setter<S> {
    fn clone(&self) -> Self {
        Self::new(self.engine.clone())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    crate::state! {
        #[derive(Debug, PartialEq)]
        struct Name / NamePatch {
            first: String,
            last: String,
        }
    }

    fn engine() -> Engine<Name> {
        Engine::new(Name {
            first: String::new(),
            last: String::new(),
        })
    }

    #[test]
    fn binding_starts_with_projection() {
        let engine = engine();
        engine.set(NamePatch::default().first("Ada")).unwrap();

        let binding = Binding::new(&engine, |s: &Name| s.first.clone());
        assert_eq!(binding.get(), "Ada");
        assert_eq!(binding.recompute_count(), 0);
    }

    #[test]
    fn binding_tracks_updates() {
        let engine = engine();
        let binding = Binding::new(&engine, |s: &Name| s.first.clone());

        engine.set(NamePatch::default().first("Ada")).unwrap();
        assert_eq!(binding.get(), "Ada");
        assert_eq!(binding.change_count(), 1);
    }

    #[test]
    fn unrelated_update_recomputes_without_change() {
        let engine = engine();
        let binding = Binding::new(&engine, |s: &Name| s.first.clone());

        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();
        binding.on_change(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        engine.set(NamePatch::default().last("Lovelace")).unwrap();
        assert_eq!(binding.recompute_count(), 1);
        assert_eq!(binding.change_count(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        engine.set(NamePatch::default().first("Ada")).unwrap();
        assert_eq!(binding.recompute_count(), 2);
        assert_eq!(binding.change_count(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn on_change_receives_new_value() {
        let engine = engine();
        let binding = Binding::new(&engine, |s: &Name| s.first.len());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        binding.on_change(move |len| seen_clone.lock().push(*len));

        engine.set(NamePatch::default().first("Ada")).unwrap();
        engine.set(NamePatch::default().first("Bob")).unwrap();
        engine.set(NamePatch::default().first("Grace")).unwrap();

        assert_eq!(*seen.lock(), vec![3, 5]);
    }

    #[test]
    fn drop_unsubscribes() {
        let engine = engine();
        let binding = Binding::new(&engine, |s: &Name| s.first.clone());
        assert_eq!(engine.subscriber_count(), 1);

        drop(binding);
        assert_eq!(engine.subscriber_count(), 0);
    }

    #[test]
    fn parts_expose_full_shape_setter() {
        let engine = engine();
        let binding = Binding::new(&engine, |s: &Name| s.first.clone());

        let (value, set, reset) = binding.parts();
        assert_eq!(value, "");

        // The setter is not narrowed to the projection.
        set.set(NamePatch::default().last("Lovelace")).unwrap();
        assert_eq!(engine.get().last, "Lovelace");

        binding.set(NamePatch::default().first("Ada")).unwrap();
        assert_eq!(binding.get(), "Ada");

        reset.reset().unwrap();
        assert_eq!(binding.get(), "");
        assert_eq!(engine.get().last, "");
    }

    #[test]
    fn change_callback_may_write_to_store() {
        let engine = engine();
        let binding = Binding::new(&engine, |s: &Name| s.first.clone());

        let weak = engine.downgrade();
        binding.on_change(move |first| {
            if let Some(engine) = weak.upgrade() {
                let last = format!("{first}-mirror");
                if engine.get().last != last {
                    engine.set(NamePatch::default().last(last)).unwrap();
                }
            }
        });

        engine.set(NamePatch::default().first("Ada")).unwrap();
        assert_eq!(engine.get().last, "Ada-mirror");
        assert_eq!(binding.get(), "Ada");
    }
}
