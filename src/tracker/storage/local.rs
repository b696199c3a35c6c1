use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::tracker::error::TrackerError;
use crate::tracker::storage::StorageBackend;

/// Durable backend: a JSON map of string keys to string values in a single
/// file, the local-storage tier of the stack. The file is shared with
/// whatever else the host keeps in it, so reads and writes preserve foreign
/// keys and a corrupt file degrades to an empty map instead of an error.
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<HashMap<String, String>, TrackerError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(serde_json::from_str(&raw).unwrap_or_default()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(TrackerError::unavailable("local", e)),
        }
    }

    fn store(&self, values: &HashMap<String, String>) -> Result<(), TrackerError> {
        let raw = serde_json::to_string(values)
            .map_err(|e| TrackerError::unavailable("local", e))?;
        fs::write(&self.path, raw).map_err(|e| TrackerError::unavailable("local", e))
    }
}

impl StorageBackend for LocalStore {
    fn name(&self) -> &'static str {
        "local"
    }

    fn write(&self, key: &str, value: &str) -> Result<(), TrackerError> {
        let mut values = self.load()?;
        values.insert(key.to_string(), value.to_string());
        self.store(&values)
    }

    fn read(&self, key: &str) -> Result<Option<String>, TrackerError> {
        Ok(self.load()?.get(key).cloned())
    }

    fn clear(&self, key: &str) -> Result<(), TrackerError> {
        let mut values = self.load()?;
        if values.remove(key).is_some() {
            self.store(&values)?;
        }
        Ok(())
    }
}
