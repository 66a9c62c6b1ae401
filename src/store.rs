//! Local key-value storage for persisted records
//!
//! Records are JSON values stored under string keys. The file-backed store keeps
//! the whole map in memory and rewrites the file on every `set`.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, error, info};

use crate::error::{StoreError, StoreResult};

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<Value>>;
    fn set(&self, key: &str, value: Value) -> StoreResult<()>;
}

/// Read `key` and decode it as `T`. A record that fails to decode is `Corrupt`.
pub fn get_record<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> StoreResult<Option<T>> {
    match store.get(key)? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}

pub fn set_record<T: Serialize>(store: &dyn KeyValueStore, key: &str, record: &T) -> StoreResult<()> {
    let value = serde_json::to_value(record)?;
    store.set(key, value)
}

/// JSON file holding one object with a member per key
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    /// Open the store at `path`. A missing file starts empty; an unreadable or
    /// corrupt file is logged and also starts empty so records fall back to defaults.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Map<String, Value>>(&contents) {
                Ok(map) => {
                    info!(path = %path.display(), records = map.len(), "Loaded state file");
                    map
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "State file is corrupt, starting from defaults");
                    Map::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No state file yet, starting from defaults");
                Map::new()
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to read state file, starting from defaults");
                Map::new()
            }
        };

        Self {
            path,
            values: Mutex::new(values),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_file(&self, values: &Map<String, Value>) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(values)?;

        // Atomic replace via temp file
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "Wrote state file");
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let values = self
            .values
            .lock()
            .map_err(|_| StoreError::Unavailable("state map lock poisoned".to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| StoreError::Unavailable("state map lock poisoned".to_string()))?;
        values.insert(key.to_string(), value);
        self.write_file(&values)
    }
}
