//! Durable Key-Value Storage
//!
//! Engines persist their state through a [`KeyValueStorage`] backend: a
//! synchronous, string-keyed medium with get/set/remove. The backend is an
//! external collaborator and may be absent altogether, in which case the
//! engine keeps its state in memory only.
//!
//! # Backends
//!
//! - [`MemoryStorage`]: a concurrent in-process map. Survives engine
//!   teardown but not the process. Useful for tests and for sharing a
//!   snapshot between successive scope activations.
//! - [`FileStorage`]: one file per key inside a directory.
//!
//! # Failure Model
//!
//! Persistence is best-effort. The engine logs backend failures and carries
//! on with its in-memory state; a backend never makes an update fail.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::error::StorageError;

/// A synchronous string-keyed storage medium.
pub trait KeyValueStorage: Send + Sync {
    /// Read the value under `key`, or `None` if there is no entry.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write `value` under `key`, replacing any previous entry.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete the entry under `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}
