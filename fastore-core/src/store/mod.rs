//! The Store Engine
//!
//! An [`Engine`] owns the canonical state of one store instance and the set
//! of callbacks subscribed to it. It exposes four operations:
//!
//! - `get`: the current immutable snapshot
//! - `set`: shallow-merge a patch, persist, notify
//! - `subscribe`: register a callback, returning a [`Subscription`]
//! - `reset`: restore the initial state, drop the persisted copy, notify
//!
//! Notification is global: every subscriber runs after every update.
//! Narrowing attention to a slice of the state is the job of the selector
//! bindings built on top (see [`crate::binding`]).

mod engine;
mod subscriber;

pub use engine::{Engine, WeakEngine};
pub use subscriber::{Notify, SubscriberId, Subscription};
