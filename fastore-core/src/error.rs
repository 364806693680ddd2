//! Error types for fastore.
//!
//! Store-level failures and storage-backend failures are kept apart:
//! storage errors are best-effort and mostly end up in logs, while store
//! errors are returned to the caller.

use thiserror::Error;

/// Errors returned by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A selector binding or reset handle was requested from a context
    /// with no enclosing scope for the family.
    #[error("{operation} must be used within a store scope")]
    OutsideScope {
        operation: &'static str,
    },

    /// The persisted snapshot could not be decoded into the state shape.
    #[error("persisted snapshot under key '{key}' is malformed: {source}")]
    MalformedSnapshot {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A subscriber kept writing to the store from inside notification.
    #[error("notification depth limit of {limit} exceeded, re-entrant update rejected")]
    NotificationDepthExceeded {
        limit: usize,
    },

    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),
}

/// Errors raised by a durable key-value backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend cannot be used in this environment.
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("invalid storage key '{0}'")]
    InvalidKey(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outside_scope_names_the_operation() {
        let err = StoreError::OutsideScope {
            operation: "use_selector",
        };
        assert_eq!(
            err.to_string(),
            "use_selector must be used within a store scope"
        );
    }

    #[test]
    fn malformed_snapshot_keeps_source() {
        use std::error::Error as _;

        let source = serde_json::from_str::<u32>("{").unwrap_err();
        let err = StoreError::MalformedSnapshot {
            key: "form".to_string(),
            source,
        };
        assert!(err.to_string().contains("'form'"));
        assert!(err.source().is_some());
    }
}
