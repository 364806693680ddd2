//! Scope Context
//!
//! A [`Context`] is what observers use to find the nearest enclosing store
//! engine without every intermediate layer passing the engine along.
//!
//! # Implementation
//!
//! The context is an immutable linked list of frames. Each frame records
//! which family it belongs to and a weak reference to the slot owned by the
//! scope that pushed it. Providing a scope never mutates the parent context;
//! it returns a new child context, so sibling subtrees stay isolated.
//!
//! Lookup walks from the innermost frame outwards and returns the first
//! live frame of the requested family. Frames whose scope has been dropped
//! no longer resolve.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::state::State;
use crate::store::Engine;

/// Identity of a store family, shared by every scope it activates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FamilyId(u64);

impl FamilyId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// An entry in the context chain.
struct Frame {
    family: FamilyId,
    /// Points at the `Engine<S>` slot owned by a `Scope<S>`.
    slot: Weak<dyn Any + Send + Sync>,
    parent: Option<Arc<Frame>>,
}

/// The environment handed down a tree of observers.
///
/// Cloning is cheap; clones share frames.
#[derive(Clone, Default)]
pub struct Context {
    head: Option<Arc<Frame>>,
}

impl Context {
    /// An empty context with no scope in it.
    pub fn root() -> Self {
        Self::default()
    }

    /// Number of frames between this context and the root.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut frame = self.head.as_deref();
        while let Some(current) = frame {
            depth += 1;
            frame = current.parent.as_deref();
        }
        depth
    }

    pub(crate) fn push<S: State>(&self, family: FamilyId, slot: &Arc<Engine<S>>) -> Self {
        let erased: Arc<dyn Any + Send + Sync> = Arc::clone(slot) as Arc<dyn Any + Send + Sync>;
        Self {
            head: Some(Arc::new(Frame {
                family,
                slot: Arc::downgrade(&erased),
                parent: self.head.clone(),
            })),
        }
    }

    /// Find the nearest live engine for `family`.
    pub(crate) fn lookup<S: State>(&self, family: FamilyId) -> Option<Engine<S>> {
        let mut frame = self.head.as_deref();
        while let Some(current) = frame {
            if current.family == family {
                let engine = current
                    .slot
                    .upgrade()
                    .and_then(|slot| slot.downcast::<Engine<S>>().ok());
                if let Some(engine) = engine {
                    return Some(Engine::clone(&engine));
                }
            }
            frame = current.parent.as_deref();
        }
        None
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("depth", &self.depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn root_context_resolves_nothing() {
        let ctx = Context::root();
        assert_eq!(ctx.depth(), 0);
        assert!(ctx.lookup::<Value>(FamilyId::new()).is_none());
    }

    #[test]
    fn push_does_not_affect_parent() {
        let family = FamilyId::new();
        let slot = Arc::new(Engine::new(json!({})));

        let root = Context::root();
        let child = root.push(family, &slot);

        assert_eq!(child.depth(), 1);
        assert!(child.lookup::<Value>(family).is_some());
        assert!(root.lookup::<Value>(family).is_none());
    }

    #[test]
    fn nearest_frame_wins() {
        let family = FamilyId::new();
        let outer = Arc::new(Engine::new(json!({"level": "outer"})));
        let inner = Arc::new(Engine::new(json!({"level": "inner"})));

        let ctx = Context::root().push(family, &outer).push(family, &inner);
        let found = ctx.lookup::<Value>(family).unwrap();
        assert!(found.ptr_eq(&inner));
    }

    #[test]
    fn other_families_are_skipped() {
        let wanted = FamilyId::new();
        let other = FamilyId::new();
        let wanted_slot = Arc::new(Engine::new(json!({"which": "wanted"})));
        let other_slot = Arc::new(Engine::new(json!({"which": "other"})));

        let ctx = Context::root()
            .push(wanted, &wanted_slot)
            .push(other, &other_slot);
        assert!(ctx.lookup::<Value>(wanted).unwrap().ptr_eq(&wanted_slot));
    }

    #[test]
    fn dropped_slot_no_longer_resolves() {
        let family = FamilyId::new();
        let slot = Arc::new(Engine::new(json!({})));
        let ctx = Context::root().push(family, &slot);

        drop(slot);
        assert!(ctx.lookup::<Value>(family).is_none());
    }
}
