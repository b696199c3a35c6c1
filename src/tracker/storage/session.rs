use std::collections::HashMap;
use std::sync::Mutex;

use crate::tracker::error::TrackerError;
use crate::tracker::storage::StorageBackend;

/// In-process backend. Lives for the lifetime of the embedding process and
/// is gone afterwards, which is exactly the session-scoped tier of the
/// stack.
pub struct SessionStore {
    values: Mutex<HashMap<String, String>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for SessionStore {
    fn name(&self) -> &'static str {
        "session"
    }

    fn write(&self, key: &str, value: &str) -> Result<(), TrackerError> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| TrackerError::unavailable("session", "poisoned lock"))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<String>, TrackerError> {
        let values = self
            .values
            .lock()
            .map_err(|_| TrackerError::unavailable("session", "poisoned lock"))?;
        Ok(values.get(key).cloned())
    }

    fn clear(&self, key: &str) -> Result<(), TrackerError> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| TrackerError::unavailable("session", "poisoned lock"))?;
        values.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_survive_within_the_process() {
        let store = SessionStore::new();
        store.write("elspor_attrib", "value").unwrap();
        assert_eq!(store.read("elspor_attrib").unwrap().as_deref(), Some("value"));
    }

    #[test]
    fn clear_only_touches_our_key() {
        let store = SessionStore::new();
        store.write("elspor_attrib", "ours").unwrap();
        store.write("host_key", "theirs").unwrap();
        store.clear("elspor_attrib").unwrap();
        assert!(store.read("elspor_attrib").unwrap().is_none());
        assert_eq!(store.read("host_key").unwrap().as_deref(), Some("theirs"));
    }
}
