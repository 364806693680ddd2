//! fastore Core
//!
//! This crate provides a selective-subscription shared store: one mutable
//! state value shared across a tree of independent observers, where each
//! observer is told about an update only when the slice of state it reads
//! actually changed.
//!
//! It implements:
//!
//! - The store engine (state, shallow-merge updates, notification fan-out)
//! - Scoped engine instances discoverable through an explicit context
//! - Selector bindings with value-equality change detection
//! - Best-effort persistence to a durable key-value backend
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `state`: the `State` trait and the `state!` macro for struct shapes
//! - `store`: the engine and its subscriber set
//! - `scope`: store families, scope activation, and contexts
//! - `binding`: selector bindings and reset handles used by observers
//! - `storage`: durable key-value backends
//! - `config`, `error`: configuration and error types
//!
//! # Example
//!
//! ```rust,ignore
//! use fastore_core::{create_store, Context};
//!
//! fastore_core::state! {
//!     #[derive(Debug, PartialEq)]
//!     pub struct Name / NamePatch {
//!         pub first: String,
//!         pub last: String,
//!     }
//! }
//!
//! let family = create_store(Name { first: "".into(), last: "".into() }, None);
//! let scope = family.activate()?;
//! let ctx = scope.provide(&Context::root());
//!
//! let first = family.use_selector(&ctx, |s| s.first.clone())?;
//! let last = family.use_selector(&ctx, |s| s.last.clone())?;
//!
//! first.set(NamePatch::default().first("Ada"))?;
//! assert_eq!(first.change_count(), 1);
//! assert_eq!(last.change_count(), 0);  // re-ran, unchanged
//! ```

pub mod binding;
pub mod config;
pub mod error;
pub mod scope;
pub mod state;
pub mod storage;
pub mod store;

pub use binding::{Binding, Resetter, Setter};
pub use config::{SnapshotPolicy, StoreConfig};
pub use error::{StorageError, StoreError};
pub use scope::{create_store, Context, FamilyId, Scope, StoreFamily};
pub use state::State;
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
pub use store::{Engine, Notify, SubscriberId, Subscription, WeakEngine};
