use super::{StorageBackend, StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory storage backend for tests and ephemeral sessions.
///
/// State is lost when the process exits. Counts successful writes so
/// callers can check that a transition persisted exactly once.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, String>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `set` and `remove` calls so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl StorageBackend for MemoryStore {
    fn name(&self) -> &str {
        "MemoryStore"
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let guard = self
            .data
            .read()
            .map_err(|_| StorageError::Unavailable("lock poisoned".into()))?;
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| StorageError::Unavailable("lock poisoned".into()))?;
        guard.insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| StorageError::Unavailable("lock poisoned".into()))?;
        guard.remove(key);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Backend standing in for disabled storage: every operation fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableStore;

impl StorageBackend for UnavailableStore {
    fn name(&self) -> &str {
        "UnavailableStore"
    }

    fn get(&self, _key: &str) -> StorageResult<Option<String>> {
        Err(StorageError::Unavailable("storage disabled".into()))
    }

    fn set(&self, _key: &str, _value: &str) -> StorageResult<()> {
        Err(StorageError::Unavailable("storage disabled".into()))
    }

    fn remove(&self, _key: &str) -> StorageResult<()> {
        Err(StorageError::Unavailable("storage disabled".into()))
    }
}
