//! File-backed state store.
//!
//! One file per [`StateKey`] inside a directory held under an exclusive
//! [`FileLock`]:
//!
//! ```text
//! state-dir/
//! ├── .suitcast.lock
//! ├── history.state
//! ├── correlations.state
//! ├── forecasts.state
//! ├── engine_state.state
//! └── rules.state
//! ```
//!
//! Every save writes a temporary file, fsyncs it, then renames it over the
//! previous version, so a crash leaves either the old or the new record.

mod codec;
mod file_lock;

pub use file_lock::FileLock;

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{SuitcastResult, ValidationError};
use crate::storage::traits::{StateKey, StateStore, StorageError};

const EXTENSION: &str = "state";
const TEMP_EXTENSION: &str = "state.tmp";

/// Configuration for file-backed storage.
#[derive(Debug, Clone)]
pub struct PersistentConfig {
    /// Whether to fsync every record before renaming it into place.
    pub sync_on_write: bool,
    /// Largest record accepted on load (bytes).
    pub max_record_size: usize,
}

impl Default for PersistentConfig {
    fn default() -> Self {
        Self {
            sync_on_write: true,
            max_record_size: codec::MAX_FRAME_SIZE,
        }
    }
}

impl PersistentConfig {
    const MIN_RECORD_SIZE: usize = 4 * 1024;

    /// Checks the configured limits.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConfig` if `max_record_size` is below 4 KiB.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.max_record_size < Self::MIN_RECORD_SIZE {
            return Err(ValidationError::config(
                "max_record_size",
                format!(
                    "must be at least {} bytes (got {})",
                    Self::MIN_RECORD_SIZE,
                    self.max_record_size
                ),
            ));
        }
        Ok(self)
    }
}

/// `StateStore` writing one framed file per key.
#[derive(Debug)]
pub struct FileStateStore {
    dir: PathBuf,
    config: PersistentConfig,
    _lock: FileLock,
    // serializes writers inside this process; the FileLock covers other processes
    write_guard: Mutex<()>,
}

impl FileStateStore {
    /// Opens (creating if needed) a state directory and locks it.
    ///
    /// Leftover temporary files from an interrupted save are removed.
    ///
    /// # Errors
    ///
    /// - `StorageError::Locked` if another process holds the directory
    /// - `StorageError::BackendError` if the directory cannot be created
    pub fn open(dir: &Path, config: PersistentConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(dir)
            .map_err(|e| StorageError::BackendError(format!("failed to create state directory: {e}")))?;

        let lock = FileLock::acquire(dir).map_err(|e| {
            if e.kind() == ErrorKind::WouldBlock {
                StorageError::Locked(format!("{}: {e}", dir.display()))
            } else {
                StorageError::BackendError(format!("failed to acquire lock: {e}"))
            }
        })?;

        let store = Self {
            dir: dir.to_path_buf(),
            config,
            _lock: lock,
            write_guard: Mutex::new(()),
        };
        store.sweep_temp_files();
        Ok(store)
    }

    /// Directory holding the state files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: StateKey) -> PathBuf {
        self.dir.join(format!("{}.{EXTENSION}", key.as_str()))
    }

    fn temp_path_for(&self, key: StateKey) -> PathBuf {
        self.dir.join(format!("{}.{TEMP_EXTENSION}", key.as_str()))
    }

    fn sweep_temp_files(&self) {
        for key in StateKey::ALL {
            let temp = self.temp_path_for(key);
            match fs::remove_file(&temp) {
                Ok(()) => warn!(path = %temp.display(), "removed interrupted state write"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(path = %temp.display(), error = %e, "could not remove temporary state file"),
            }
        }
    }

    fn read_record(&self, path: &Path) -> std::io::Result<Value> {
        let mut reader = BufReader::new(File::open(path)?);
        codec::read_header(&mut reader)?;
        codec::decode(&mut reader, self.config.max_record_size)
    }

    fn write_record(&self, key: StateKey, value: &Value) -> std::io::Result<()> {
        let temp = self.temp_path_for(key);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp)?;

        let mut writer = BufWriter::new(file);
        codec::write_header(&mut writer)?;
        writer.write_all(&codec::encode(value)?)?;
        writer.flush()?;
        if self.config.sync_on_write {
            writer.get_ref().sync_all()?;
        }
        drop(writer);

        fs::rename(&temp, self.path_for(key))
    }
}

impl StateStore for FileStateStore {
    fn load(&self, key: StateKey) -> Result<Option<Value>, StorageError> {
        let path = self.path_for(key);
        match self.read_record(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == ErrorKind::InvalidData || e.kind() == ErrorKind::UnexpectedEof => {
                Err(StorageError::SerializationError(format!("{}: {e}", path.display())))
            }
            Err(e) => Err(StorageError::BackendError(format!("failed to read {}: {e}", path.display()))),
        }
    }

    fn save(&self, key: StateKey, value: &Value) -> Result<(), StorageError> {
        let _guard = self
            .write_guard
            .lock()
            .map_err(|_| StorageError::BackendError("poisoned lock: state.save".to_string()))?;
        self.write_record(key, value)
            .map_err(|e| StorageError::BackendError(format!("failed to write {key}: {e}")))?;
        debug!(%key, "state saved");
        Ok(())
    }

    fn remove(&self, key: StateKey) -> Result<(), StorageError> {
        let _guard = self
            .write_guard
            .lock()
            .map_err(|_| StorageError::BackendError("poisoned lock: state.remove".to_string()))?;
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::BackendError(format!("failed to remove {key}: {e}"))),
        }
    }
}

/// Opens a file-backed state store at `path`.
///
/// # Errors
///
/// Returns a validation error for a bad `config`, or a storage error if the
/// directory cannot be created or is locked by another process.
///
/// # Example
/// ```rust,ignore
/// use suitcast::storage::persistent::open_state_dir;
///
/// let store = open_state_dir("./suitcast-state", None)?;
/// engine.save(&store)?;
/// ```
pub fn open_state_dir(path: impl AsRef<Path>, config: Option<PersistentConfig>) -> SuitcastResult<FileStateStore> {
    let cfg = config.unwrap_or_default().validate()?;
    Ok(FileStateStore::open(path.as_ref(), cfg)?)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_save_then_load_across_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = open_state_dir(dir.path(), None).unwrap();
            store.save(StateKey::EngineState, &json!({"mode": "adaptive"})).unwrap();
        }
        let store = open_state_dir(dir.path(), None).unwrap();
        assert_eq!(
            store.load(StateKey::EngineState).unwrap(),
            Some(json!({"mode": "adaptive"}))
        );
        assert!(store.load(StateKey::Rules).unwrap().is_none());
    }

    #[test]
    fn test_directory_is_exclusive() {
        let dir = tempdir().unwrap();
        let _held = open_state_dir(dir.path(), None).unwrap();
        let err = open_state_dir(dir.path(), None).unwrap_err();
        assert!(err.is_storage());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_corrupted_file_is_serialization_error() {
        let dir = tempdir().unwrap();
        let store = open_state_dir(dir.path(), None).unwrap();
        store.save(StateKey::History, &json!([1, 2, 3])).unwrap();

        let path = dir.path().join("history.state");
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 6;
        bytes[last] ^= 0xFF;
        fs::write(&path, bytes).unwrap();

        let err = store.load(StateKey::History).unwrap_err();
        assert!(matches!(err, StorageError::SerializationError(_)));
    }

    #[test]
    fn test_leftover_temp_file_swept_on_open() {
        let dir = tempdir().unwrap();
        let temp = dir.path().join("rules.state.tmp");
        fs::write(&temp, b"partial").unwrap();
        let _store = open_state_dir(dir.path(), None).unwrap();
        assert!(!temp.exists());
    }

    #[test]
    fn test_remove_missing_is_ok() {
        let dir = tempdir().unwrap();
        let store = open_state_dir(dir.path(), None).unwrap();
        store.remove(StateKey::Forecasts).unwrap();
        store.save(StateKey::Forecasts, &json!([])).unwrap();
        store.remove(StateKey::Forecasts).unwrap();
        assert!(store.load(StateKey::Forecasts).unwrap().is_none());
    }

    #[test]
    fn test_config_rejects_tiny_records() {
        let cfg = PersistentConfig {
            max_record_size: 16,
            ..PersistentConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
