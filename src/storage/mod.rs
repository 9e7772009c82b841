//! Persistence of the reel configuration and recent history.
//!
//! Two layers:
//!
//! - [`StorageBackend`]: a fallible string key/value store. Backends report
//!   every failure as a [`StorageError`].
//! - [`ReelStore`]: the infallible interface the session controller calls.
//!   It is implemented for every backend and never lets an error escape:
//!   failed reads yield defaults, failed writes are logged and dropped.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | `StorageError::Io` | File I/O failure | Read yields defaults, write dropped |
//! | `StorageError::Serialization` | JSON encode failure | Write dropped |
//! | `StorageError::Unavailable` | Storage disabled | Read yields defaults, write dropped |
//! | Malformed JSON | Hand-edited or truncated file | Defaults used |

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::{MemoryStore, UnavailableStore};

use crate::config::ReelConfig;
use crate::domain::core::Symbol;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Key of the persisted config record
pub const CONFIG_KEY: &str = "letter-reel:v1:config";
/// Key of the persisted history log
pub const HISTORY_KEY: &str = "letter-reel:v1:history";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Pluggable string key/value storage.
///
/// Implementations must be thread-safe (`Send + Sync`); the controller's
/// run scheduler lives on a tokio runtime.
pub trait StorageBackend: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Reads the value stored under `key`, `None` if absent.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Replaces the value stored under `key`.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removes `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;
}

impl<B: StorageBackend + ?Sized> StorageBackend for Arc<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        (**self).remove(key)
    }
}

/// Config/history store consumed by the session controller.
///
/// None of these operations can fail: storage problems degrade to
/// defaults on read and to silent no-ops on write.
pub trait ReelStore: Send + Sync {
    /// Sanitized config, defaults filled in for anything missing.
    fn load_config(&self) -> ReelConfig;
    fn persist_config(&self, config: &ReelConfig);
    /// Persisted history, keeping only single-letter entries.
    fn load_history(&self) -> Vec<Symbol>;
    fn persist_history(&self, history: &[Symbol]);
    /// Clears both config and history.
    fn reset_all(&self);
}

impl<B: StorageBackend + ?Sized> ReelStore for B {
    fn load_config(&self) -> ReelConfig {
        let Some(raw) = read_key(self, CONFIG_KEY) else {
            return ReelConfig::default();
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => ReelConfig::from_json(&value),
            Err(e) => {
                tracing::debug!(backend = self.name(), "Ignoring malformed config: {}", e);
                ReelConfig::default()
            }
        }
    }

    fn persist_config(&self, config: &ReelConfig) {
        write_json(self, CONFIG_KEY, config);
    }

    fn load_history(&self) -> Vec<Symbol> {
        let Some(raw) = read_key(self, HISTORY_KEY) else {
            return Vec::new();
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|s| Symbol::parse(&s.to_uppercase()))
                .collect(),
            Ok(_) => Vec::new(),
            Err(e) => {
                tracing::debug!(backend = self.name(), "Ignoring malformed history: {}", e);
                Vec::new()
            }
        }
    }

    fn persist_history(&self, history: &[Symbol]) {
        write_json(self, HISTORY_KEY, &history);
    }

    fn reset_all(&self) {
        for key in [CONFIG_KEY, HISTORY_KEY] {
            if let Err(e) = self.remove(key) {
                tracing::warn!(backend = self.name(), key, "Failed to clear stored value: {}", e);
            }
        }
    }
}

fn read_key<B: StorageBackend + ?Sized>(backend: &B, key: &str) -> Option<String> {
    match backend.get(key) {
        Ok(Some(raw)) if !raw.is_empty() => Some(raw),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(backend = backend.name(), key, "Failed to read stored value: {}", e);
            None
        }
    }
}

fn write_json<B, T>(backend: &B, key: &str, value: &T)
where
    B: StorageBackend + ?Sized,
    T: serde::Serialize + ?Sized,
{
    let result = serde_json::to_string(value)
        .map_err(StorageError::from)
        .and_then(|json| backend.set(key, &json));

    if let Err(e) = result {
        tracing::warn!(backend = backend.name(), key, "Failed to persist value: {}", e);
    }
}
