//! Reset handle.

use crate::error::StoreError;
use crate::state::State;
use crate::store::Engine;

/// The store's reset operation, usable without binding a selector.
///
/// Holding a `Resetter` does not subscribe to the store and never causes a
/// recomputation by itself.
pub struct Resetter<S: State> {
    engine: Engine<S>,
}

impl<S: State> Resetter<S> {
    pub(crate) fn new(engine: Engine<S>) -> Self {
        Self { engine }
    }

    /// Restore the initial state and remove the persisted snapshot.
    pub fn reset(&self) -> Result<(), StoreError> {
        self.engine.reset()
    }
}

impl<S: State> Clone for Resetter<S> {
    fn clone(&self) -> Self {
        Self::new(self.engine.clone())
    }
}
