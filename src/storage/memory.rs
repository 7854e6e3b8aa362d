//! In-memory state store.
//!
//! Thread-safe and process-local. Used by tests, embedded hosts, and as the
//! reference behavior for file-backed stores.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;

use crate::storage::traits::{StateKey, StateStore, StorageError};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

/// `StateStore` backed by a `HashMap` behind a `RwLock`.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    records: RwLock<HashMap<StateKey, Value>>,
}

impl InMemoryStateStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the lock is poisoned.
    pub fn len(&self) -> Result<usize, StorageError> {
        let records = self.records.read().map_err(|_| lock_err("state.len"))?;
        Ok(records.len())
    }

    /// Returns true if nothing has been saved.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}

impl StateStore for InMemoryStateStore {
    fn load(&self, key: StateKey) -> Result<Option<Value>, StorageError> {
        let records = self.records.read().map_err(|_| lock_err("state.load"))?;
        Ok(records.get(&key).cloned())
    }

    fn save(&self, key: StateKey, value: &Value) -> Result<(), StorageError> {
        let mut records = self.records.write().map_err(|_| lock_err("state.save"))?;
        records.insert(key, value.clone());
        Ok(())
    }

    fn remove(&self, key: StateKey) -> Result<(), StorageError> {
        let mut records = self.records.write().map_err(|_| lock_err("state.remove"))?;
        records.remove(&key);
        Ok(())
    }
}
