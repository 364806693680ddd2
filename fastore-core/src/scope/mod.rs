//! Scope Binding
//!
//! A store family ([`StoreFamily`], built by [`create_store`]) is the Rust
//! counterpart of a provider/hook trio: it activates scopes, and it binds
//! observers to whichever scope encloses them.
//!
//! # Concepts
//!
//! ## Scopes
//!
//! A [`Scope`] is one activation of a family. It creates exactly one
//! engine and keeps it alive until the scope is dropped. Two sibling
//! scopes never share an engine.
//!
//! ## Contexts
//!
//! A [`Context`] is passed explicitly down the observer tree.
//! `Scope::provide` returns a child context in which the scope's engine is
//! visible. Observers look the engine up through the family, so they never
//! need a direct reference to the scope.
//!
//! There is no global registry: an engine is reachable only
//! through contexts derived from its scope.

mod context;
mod family;

pub use context::{Context, FamilyId};
pub use family::{create_store, Scope, StoreFamily};
