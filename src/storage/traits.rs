//! State store contract.
//!
//! The engine persists a handful of independent records, each under its own
//! [`StateKey`]. Backends only move JSON values; typing happens at the edge
//! through [`load_as`] and [`save_as`].

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Names of the persisted records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKey {
    /// History window entries.
    History,
    /// Correlation records.
    Correlations,
    /// Forecast ledger.
    Forecasts,
    /// Mode, counters and timestamps.
    EngineState,
    /// Active rule list.
    Rules,
}

impl StateKey {
    /// Every key, in load order.
    pub const ALL: [StateKey; 5] = [
        StateKey::History,
        StateKey::Correlations,
        StateKey::Forecasts,
        StateKey::EngineState,
        StateKey::Rules,
    ];

    /// Stable name, used as a file stem by file backends.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            StateKey::History => "history",
            StateKey::Correlations => "correlations",
            StateKey::Forecasts => "forecasts",
            StateKey::EngineState => "engine_state",
            StateKey::Rules => "rules",
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No record stored under the key.
    #[error("State not found: {0}")]
    NotFound(StateKey),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Another process or handle holds the store.
    #[error("State store locked: {0}")]
    Locked(String),
}

/// Key-value persistence for engine state.
///
/// Implementations must be safe to share between threads; the engine
/// itself calls them from one thread only.
pub trait StateStore: Send + Sync {
    /// Loads the value stored under `key`, `None` if nothing was saved yet.
    fn load(&self, key: StateKey) -> Result<Option<Value>, StorageError>;

    /// Replaces the value stored under `key`.
    fn save(&self, key: StateKey, value: &Value) -> Result<(), StorageError>;

    /// Removes the value stored under `key`. Removing a missing key is not an error.
    fn remove(&self, key: StateKey) -> Result<(), StorageError>;
}

/// Loads and deserializes a record.
///
/// # Errors
///
/// Propagates backend errors; returns `StorageError::SerializationError` if
/// the stored value does not match `T`.
pub fn load_as<T: DeserializeOwned>(store: &dyn StateStore, key: StateKey) -> Result<Option<T>, StorageError> {
    store
        .load(key)?
        .map(|value| {
            serde_json::from_value(value)
                .map_err(|e| StorageError::SerializationError(format!("{key}: {e}")))
        })
        .transpose()
}

/// Serializes and saves a record.
///
/// # Errors
///
/// Propagates backend errors; returns `StorageError::SerializationError` if
/// `value` cannot be represented as JSON.
pub fn save_as<T: Serialize + ?Sized>(store: &dyn StateStore, key: StateKey, value: &T) -> Result<(), StorageError> {
    let json = serde_json::to_value(value)
        .map_err(|e| StorageError::SerializationError(format!("{key}: {e}")))?;
    store.save(key, &json)
}

/// Loads a record that must exist.
///
/// # Errors
///
/// Returns `StorageError::NotFound` if nothing is stored under `key`.
pub fn require_as<T: DeserializeOwned>(store: &dyn StateStore, key: StateKey) -> Result<T, StorageError> {
    load_as(store, key)?.ok_or(StorageError::NotFound(key))
}
