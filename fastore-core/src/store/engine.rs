//! Store Engine
//!
//! The engine owns one canonical state value and a set of subscribers.
//!
//! # How Updates Work
//!
//! 1. `set` shallow-merges a patch into a copy of the current snapshot and
//!    swaps the new snapshot in. Readers holding the old `Arc` keep a
//!    consistent, if stale, view.
//!
//! 2. The full state is written to durable storage under the configured
//!    key, when persistence is enabled. Failures are logged, not returned.
//!
//! 3. Every registered subscriber is invoked with no arguments. The engine
//!    does not filter by what changed; selector bindings do that.
//!
//! # Re-entrancy
//!
//! No lock is held while subscribers run, so a subscriber may read or write
//! the engine. Writes from inside notification nest; the engine counts the
//! nesting and rejects updates past `max_notify_depth` so that a feedback
//! loop between subscribers terminates.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;
use tracing::{debug, error, trace, warn};

use super::subscriber::{Notify, Subscriber, SubscriberId, Subscription};
use crate::config::{SnapshotPolicy, StoreConfig};
use crate::error::StoreError;
use crate::state::State;
use crate::storage::KeyValueStorage;

/// Where and how an engine persists its state.
struct Persistence {
    key: String,
    backend: Arc<dyn KeyValueStorage>,
}

pub(crate) struct EngineInner<S: State> {
    /// Current snapshot. Replaced, never mutated in place.
    state: RwLock<Arc<S>>,

    /// Construction-time value restored by `reset`.
    initial: Arc<S>,

    subscribers: Mutex<IndexMap<SubscriberId, Subscriber>>,

    persistence: Option<Persistence>,

    /// Number of `set`/`reset` calls currently on the stack.
    depth: AtomicUsize,
    max_depth: usize,
}

/// Decrements the update depth when dropped, including on unwind.
struct DepthGuard<'a> {
    depth: &'a AtomicUsize,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<S: State> EngineInner<S> {
    fn enter_update(&self) -> Result<DepthGuard<'_>, StoreError> {
        let depth = self.depth.fetch_add(1, Ordering::SeqCst);
        if depth >= self.max_depth {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            error!(
                limit = self.max_depth,
                "re-entrant store update exceeded the notification depth limit"
            );
            return Err(StoreError::NotificationDepthExceeded {
                limit: self.max_depth,
            });
        }
        Ok(DepthGuard { depth: &self.depth })
    }

    /// Invoke every subscriber registered at the start of the fan-out.
    ///
    /// Entries removed by an earlier callback in the same fan-out are
    /// skipped.
    fn notify(&self) {
        let pending: SmallVec<[(SubscriberId, Notify); 8]> = self
            .subscribers
            .lock()
            .values()
            .map(|s| (s.id(), Arc::clone(s.notify_fn())))
            .collect();

        for (id, notify) in pending {
            let registered = self.subscribers.lock().contains_key(&id);
            if registered {
                notify();
            }
        }
    }

    fn persist(&self, state: &S) {
        let Some(persistence) = &self.persistence else {
            return;
        };

        let encoded = match serde_json::to_string(state) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(key = %persistence.key, error = %e, "failed to encode store snapshot");
                return;
            }
        };

        if let Err(e) = persistence.backend.set(&persistence.key, &encoded) {
            warn!(key = %persistence.key, error = %e, "failed to persist store snapshot");
        }
    }

    fn clear_persisted(&self) {
        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.backend.remove(&persistence.key) {
                warn!(key = %persistence.key, error = %e, "failed to remove store snapshot");
            }
        }
    }

    pub(crate) fn remove_subscriber(&self, id: SubscriberId) {
        self.subscribers.lock().shift_remove(&id);
    }
}

/// A shared store engine.
///
/// Cloning an `Engine` yields another handle to the same state and
/// subscriber set.
///
/// # Example
///
/// ```rust,ignore
/// let engine = Engine::new(Name { first: String::new(), last: String::new() });
///
/// let sub = engine.subscribe(|| println!("changed"));
/// engine.set(NamePatch::default().first("Ada"))?;   // prints "changed"
///
/// sub.unsubscribe();
/// engine.reset()?;
/// ```
pub struct Engine<S: State> {
    inner: Arc<EngineInner<S>>,
}

impl<S: State> Engine<S> {
    /// Create an in-memory engine with default configuration.
    pub fn new(initial: S) -> Self {
        let initial = Arc::new(initial);
        let state = Arc::clone(&initial);
        Self::from_parts(initial, state, None, StoreConfig::default().max_notify_depth)
    }

    /// Create an engine, seeding it from durable storage when the
    /// configuration names a key and a backend is available.
    pub fn with_config(
        initial: S,
        config: &StoreConfig,
        storage: Option<Arc<dyn KeyValueStorage>>,
    ) -> Result<Self, StoreError> {
        Self::from_shared(Arc::new(initial), config, storage)
    }

    pub(crate) fn from_shared(
        initial: Arc<S>,
        config: &StoreConfig,
        storage: Option<Arc<dyn KeyValueStorage>>,
    ) -> Result<Self, StoreError> {
        config.validate()?;

        let persistence = match (config.persistence_key(), storage) {
            (Some(key), Some(backend)) => Some(Persistence {
                key: key.to_string(),
                backend,
            }),
            _ => None,
        };

        let state = seed(&initial, config.snapshot_policy, persistence.as_ref())?;
        Ok(Self::from_parts(initial, state, persistence, config.max_notify_depth))
    }

    fn from_parts(
        initial: Arc<S>,
        state: Arc<S>,
        persistence: Option<Persistence>,
        max_depth: usize,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                state: RwLock::new(state),
                initial,
                subscribers: Mutex::new(IndexMap::new()),
                persistence,
                depth: AtomicUsize::new(0),
                max_depth,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<EngineInner<S>>) -> Self {
        Self { inner }
    }

    /// Current snapshot.
    pub fn get(&self) -> Arc<S> {
        Arc::clone(&self.inner.state.read())
    }

    /// Merge `patch` into the state, persist, then notify every subscriber.
    pub fn set(&self, patch: S::Patch) -> Result<(), StoreError> {
        let _depth = self.inner.enter_update()?;

        let next = {
            let mut state = self.inner.state.write();
            let mut next = (**state).clone();
            next.merge(patch);
            let next = Arc::new(next);
            *state = Arc::clone(&next);
            next
        };

        trace!(subscribers = self.subscriber_count(), "store updated");
        self.inner.persist(&next);
        self.inner.notify();
        Ok(())
    }

    /// Build a patch from the current snapshot and apply it.
    pub fn update<F>(&self, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&S) -> S::Patch,
    {
        let snapshot = self.get();
        let patch = f(snapshot.as_ref());
        self.set(patch)
    }

    /// Restore the construction-time state, drop the persisted snapshot, and
    /// notify.
    ///
    /// The snapshot is removed before subscribers run, so a `set` made from
    /// inside the fan-out persists as usual.
    pub fn reset(&self) -> Result<(), StoreError> {
        let _depth = self.inner.enter_update()?;

        *self.inner.state.write() = Arc::clone(&self.inner.initial);
        self.inner.clear_persisted();

        trace!(subscribers = self.subscriber_count(), "store reset");
        self.inner.notify();
        Ok(())
    }

    /// Register a callback invoked after every update.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe_shared(Arc::new(callback))
    }

    /// Register a shared callback.
    ///
    /// Registering an `Arc` that is already registered does not add a
    /// second entry; the returned handle refers to the existing one.
    pub fn subscribe_shared(&self, callback: Notify) -> Subscription {
        let id = {
            let mut subscribers = self.inner.subscribers.lock();
            match subscribers.values().find(|s| s.holds(&callback)) {
                Some(existing) => existing.id(),
                None => {
                    let subscriber = Subscriber::new(callback);
                    let id = subscriber.id();
                    subscribers.insert(id, subscriber);
                    id
                }
            }
        };
        Subscription::new(id, Arc::downgrade(&self.inner))
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    /// The key this engine persists under, if persistence is enabled.
    pub fn persistence_key(&self) -> Option<&str> {
        self.inner.persistence.as_ref().map(|p| p.key.as_str())
    }

    /// Release every subscriber. Persisted state is left untouched.
    pub fn teardown(&self) {
        let released = {
            let mut subscribers = self.inner.subscribers.lock();
            let count = subscribers.len();
            subscribers.clear();
            count
        };
        debug!(released, "store engine torn down");
    }

    pub fn downgrade(&self) -> WeakEngine<S> {
        WeakEngine {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether two handles refer to the same engine.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

fn seed<S: State>(
    initial: &Arc<S>,
    policy: SnapshotPolicy,
    persistence: Option<&Persistence>,
) -> Result<Arc<S>, StoreError> {
    let Some(persistence) = persistence else {
        return Ok(Arc::clone(initial));
    };
    let key = persistence.key.as_str();

    let raw = match persistence.backend.get(key) {
        Ok(Some(raw)) if !raw.is_empty() => raw,
        Ok(_) => {
            debug!(key, "no persisted snapshot, starting from initial state");
            return Ok(Arc::clone(initial));
        }
        Err(e) => {
            warn!(key, error = %e, "failed to read persisted snapshot, starting from initial state");
            return Ok(Arc::clone(initial));
        }
    };

    match serde_json::from_str::<S>(&raw) {
        Ok(state) => {
            debug!(key, "seeded store from persisted snapshot");
            Ok(Arc::new(state))
        }
        Err(source) => match policy {
            SnapshotPolicy::Fallback => {
                warn!(key, error = %source, "malformed persisted snapshot, starting from initial state");
                Ok(Arc::clone(initial))
            }
            SnapshotPolicy::FailFast => Err(StoreError::MalformedSnapshot {
                key: key.to_string(),
                source,
            }),
        },
    }
}

impl<S: State> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: State> std::fmt::Debug for Engine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("persistence_key", &self.persistence_key())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// A non-owning engine handle.
pub struct WeakEngine<S: State> {
    inner: Weak<EngineInner<S>>,
}

impl<S: State> WeakEngine<S> {
    pub fn upgrade(&self) -> Option<Engine<S>> {
        self.inner.upgrade().map(Engine::from_inner)
    }
}

impl<S: State> Clone for WeakEngine<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
