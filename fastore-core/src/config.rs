//! Store configuration.
//!
//! A `StoreConfig` is fixed when a family is created and applies to every
//! engine that family activates. It can be built in code or loaded from
//! JSON:
//!
//! ```rust,ignore
//! let config = StoreConfig::from_json(r#"{
//!     "persistence_key": "profile",
//!     "snapshot_policy": "fail_fast",
//!     "max_notify_depth": 8
//! }"#)?;
//! ```

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Default nesting limit for updates issued from inside notification.
pub const DEFAULT_MAX_NOTIFY_DEPTH: usize = 64;

/// What to do when a persisted snapshot cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotPolicy {
    /// Log a warning and start from the supplied initial state.
    #[default]
    Fallback,
    /// Refuse to activate the scope.
    FailFast,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Durable storage key. `None` or an empty string disables persistence.
    pub persistence_key: Option<String>,

    pub snapshot_policy: SnapshotPolicy,

    /// Maximum nesting of `set`/`reset` calls issued from subscribers.
    pub max_notify_depth: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            persistence_key: None,
            snapshot_policy: SnapshotPolicy::default(),
            max_notify_depth: DEFAULT_MAX_NOTIFY_DEPTH,
        }
    }
}

impl StoreConfig {
    /// Parse and validate a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| StoreError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_persistence_key(mut self, key: impl Into<String>) -> Self {
        self.persistence_key = Some(key.into());
        self
    }

    pub fn with_snapshot_policy(mut self, policy: SnapshotPolicy) -> Self {
        self.snapshot_policy = policy;
        self
    }

    pub fn with_max_notify_depth(mut self, depth: usize) -> Self {
        self.max_notify_depth = depth;
        self
    }

    /// The effective persistence key, if persistence is enabled.
    pub fn persistence_key(&self) -> Option<&str> {
        self.persistence_key.as_deref().filter(|key| !key.is_empty())
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.max_notify_depth == 0 {
            return Err(StoreError::InvalidConfig(
                "max_notify_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
