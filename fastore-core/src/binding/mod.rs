//! Observer Bindings
//!
//! Observers never talk to an engine directly. They go through one of two
//! adapters, both obtained from a [`StoreFamily`](crate::StoreFamily) and a
//! [`Context`](crate::Context):
//!
//! - [`Binding`]: reads a projection of the state, keeps it current, and
//!   signals the observer only when the projection changes value. Also
//!   hands out the store's write and reset operations.
//! - [`Resetter`]: the reset operation alone, with no subscription.
//!
//! # Change Detection
//!
//! The engine notifies every subscriber after every update. Each binding
//! re-runs its selector on each notification (O(subscribers) work per
//! update) and compares the result with the value it holds. Observers whose
//! projection is unchanged see nothing.

mod reset;
mod selector;

pub use reset::Resetter;
pub use selector::{Binding, Setter};
