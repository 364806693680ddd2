//! Store families and scopes.

use std::sync::Arc;

use tracing::debug;

use super::context::{Context, FamilyId};
use crate::binding::{Binding, Resetter};
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::state::State;
use crate::storage::KeyValueStorage;
use crate::store::Engine;

/// Create a store family from an initial state and an optional durable
/// storage key.
///
/// Persistence also needs a backend, supplied with
/// [`StoreFamily::with_storage`]. Without one, or with an empty key, the
/// family's engines are memory-only.
pub fn create_store<S: State>(initial: S, persistence_key: Option<&str>) -> StoreFamily<S> {
    let mut config = StoreConfig::default();
    if let Some(key) = persistence_key {
        config = config.with_persistence_key(key);
    }
    StoreFamily {
        id: FamilyId::new(),
        initial: Arc::new(initial),
        config,
        storage: None,
    }
}

/// Everything needed to activate scopes of one store shape and to bind
/// observers to them.
///
/// A family is inert: it holds no state of its own. Each call to
/// [`activate`](Self::activate) creates a fresh engine.
pub struct StoreFamily<S: State> {
    id: FamilyId,
    initial: Arc<S>,
    config: StoreConfig,
    storage: Option<Arc<dyn KeyValueStorage>>,
}

impl<S: State> StoreFamily<S> {
    pub fn with_storage(mut self, storage: Arc<dyn KeyValueStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Replace the whole configuration, persistence key included.
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn id(&self) -> FamilyId {
        self.id
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn initial(&self) -> &S {
        &self.initial
    }

    /// Create the engine for one scope activation.
    pub fn activate(&self) -> Result<Scope<S>, StoreError> {
        let engine = Engine::from_shared(
            Arc::clone(&self.initial),
            &self.config,
            self.storage.clone(),
        )?;
        debug!(
            family = ?self.id,
            persistence_key = ?engine.persistence_key(),
            "store scope activated"
        );
        Ok(Scope {
            family: self.id,
            slot: Arc::new(engine),
        })
    }

    /// The nearest engine of this family visible from `ctx`.
    pub fn lookup(&self, ctx: &Context) -> Option<Engine<S>> {
        ctx.lookup(self.id)
    }

    /// Bind an observer to a projection of the nearest enclosing store.
    pub fn use_selector<T, F>(&self, ctx: &Context, selector: F) -> Result<Binding<S, T>, StoreError>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
        F: Fn(&S) -> T + Send + Sync + 'static,
    {
        let engine = self.lookup(ctx).ok_or(StoreError::OutsideScope {
            operation: "use_selector",
        })?;
        Ok(Binding::new(&engine, selector))
    }

    /// The reset operation of the nearest enclosing store.
    pub fn use_reset(&self, ctx: &Context) -> Result<Resetter<S>, StoreError> {
        let engine = self.lookup(ctx).ok_or(StoreError::OutsideScope {
            operation: "use_reset",
        })?;
        Ok(Resetter::new(engine))
    }
}

impl<S: State> Clone for StoreFamily<S> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            initial: Arc::clone(&self.initial),
            config: self.config.clone(),
            storage: self.storage.clone(),
        }
    }
}

impl<S: State> std::fmt::Debug for StoreFamily<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreFamily")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("has_storage", &self.storage.is_some())
            .finish()
    }
}

/// One activation of a store family.
///
/// The scope owns its engine for as long as it lives. Dropping the scope
/// releases the engine's subscribers and makes the engine unreachable
/// through any context it provided. Persisted state survives.
pub struct Scope<S: State> {
    family: FamilyId,
    /// Sole strong owner; contexts hold weak references to it.
    slot: Arc<Engine<S>>,
}

impl<S: State> Scope<S> {
    pub fn engine(&self) -> &Engine<S> {
        &self.slot
    }

    pub fn family(&self) -> FamilyId {
        self.family
    }

    /// A child of `parent` in which this scope's engine is visible.
    pub fn provide(&self, parent: &Context) -> Context {
        parent.push(self.family, &self.slot)
    }

    /// Explicitly end the activation. Equivalent to dropping the scope.
    pub fn deactivate(self) {}
}

impl<S: State> Drop for Scope<S> {
    fn drop(&mut self) {
        self.slot.teardown();
        debug!(family = ?self.family, "store scope deactivated");
    }
}

impl<S: State> std::fmt::Debug for Scope<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("family", &self.family)
            .field("engine", &*self.slot)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::{json, Map, Value};

    fn patch(key: &str, value: Value) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(key.to_string(), value);
        map
    }

    #[test]
    fn activation_yields_stable_engine() {
        let family = create_store(json!({"n": 0}), None);
        let scope = family.activate().unwrap();

        let ctx_a = scope.provide(&Context::root());
        let ctx_b = scope.provide(&Context::root());

        let a = family.lookup(&ctx_a).unwrap();
        let b = family.lookup(&ctx_b).unwrap();
        assert!(a.ptr_eq(&b));
        assert!(a.ptr_eq(scope.engine()));
    }

    #[test]
    fn sibling_scopes_have_distinct_engines() {
        let family = create_store(json!({"n": 0}), None);
        let left = family.activate().unwrap();
        let right = family.activate().unwrap();

        let root = Context::root();
        let left_engine = family.lookup(&left.provide(&root)).unwrap();
        let right_engine = family.lookup(&right.provide(&root)).unwrap();
        assert!(!left_engine.ptr_eq(&right_engine));

        left_engine.set(patch("n", json!(1))).unwrap();
        assert_eq!(right_engine.get()["n"], json!(0));
    }

    #[test]
    fn lookup_fails_after_deactivation() {
        let family = create_store(json!({}), None);
        let scope = family.activate().unwrap();
        let ctx = scope.provide(&Context::root());

        let engine = family.lookup(&ctx).unwrap();
        scope.deactivate();

        assert!(family.lookup(&ctx).is_none());
        // Handles taken earlier keep working on their own.
        engine.set(patch("late", json!(true))).unwrap();
        assert_eq!(engine.subscriber_count(), 0);
    }

    #[test]
    fn families_do_not_see_each_other() {
        let first = create_store(json!({}), None);
        let second = create_store(json!({}), None);
        let scope = first.activate().unwrap();
        let ctx = scope.provide(&Context::root());

        assert!(first.lookup(&ctx).is_some());
        assert!(second.lookup(&ctx).is_none());
        assert!(matches!(
            second.use_reset(&ctx),
            Err(StoreError::OutsideScope { operation: "use_reset" })
        ));
    }

    #[test]
    fn activation_propagates_fail_fast_snapshot_error() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set("bad", "][").unwrap();

        let family = create_store(json!({}), None)
            .with_config(
                StoreConfig::default()
                    .with_persistence_key("bad")
                    .with_snapshot_policy(crate::config::SnapshotPolicy::FailFast),
            )
            .with_storage(storage);

        assert!(matches!(
            family.activate(),
            Err(StoreError::MalformedSnapshot { .. })
        ));
    }

    #[test]
    fn create_store_records_key() {
        let family = create_store(json!({}), Some("form"));
        assert_eq!(family.config().persistence_key(), Some("form"));

        let family = create_store(json!({}), Some(""));
        assert_eq!(family.config().persistence_key(), None);
    }
}
