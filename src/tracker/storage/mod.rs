pub mod cookie;
pub mod local;
pub mod session;

use log::debug;

use crate::tracker::error::TrackerError;
use crate::tracker::record::StorageRecord;

/// One place the attribution record can live. Backends share their medium
/// with the host application, so every key is namespaced by the stack and
/// a backend must tolerate foreign values next to ours.
pub trait StorageBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn write(&self, key: &str, value: &str) -> Result<(), TrackerError>;

    fn read(&self, key: &str) -> Result<Option<String>, TrackerError>;

    fn clear(&self, key: &str) -> Result<(), TrackerError>;
}

/// Priority-ordered list of storage backends behind a single interface.
///
/// Writes go to every backend and individual failures are swallowed; reads
/// return the first valid, non-expired record in priority order. When
/// mirrors disagree on the identifier, the most recently captured record
/// wins and is written back through the whole stack.
pub struct StorageStack {
    key: String,
    backends: Vec<Box<dyn StorageBackend>>,
}

impl StorageStack {
    pub fn new(namespace: &str, backends: Vec<Box<dyn StorageBackend>>) -> Self {
        Self {
            key: format!("{}_attrib", namespace),
            backends,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Serialize the record into every backend. Returns how many backends
    /// accepted the write; zero is legal and leaves the caller on the
    /// fingerprint fallback path.
    pub fn write(&self, record: &StorageRecord) -> usize {
        let value = match record.to_json() {
            Ok(value) => value,
            Err(e) => {
                debug!("attribution record failed to serialize: {}", e);
                return 0;
            }
        };

        let mut written = 0;
        for backend in &self.backends {
            match backend.write(&self.key, &value) {
                Ok(()) => written += 1,
                Err(e) => debug!("storage write skipped: {}", e),
            }
        }
        written
    }

    /// First valid, non-expired record in priority order. Malformed and
    /// expired values are treated as absent. Disagreeing mirrors are healed
    /// last-writer-wins before the winner is returned.
    pub fn read(&self) -> Option<StorageRecord> {
        let mut found: Vec<StorageRecord> = Vec::new();

        for backend in &self.backends {
            match backend.read(&self.key) {
                Ok(Some(raw)) => {
                    if let Some(record) = StorageRecord::from_json(&raw) {
                        if !record.is_expired() {
                            found.push(record);
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => debug!("storage read skipped: {}", e),
            }
        }

        let first = found.first()?.clone();

        let disagreement = found.iter().any(|r| r.identifier != first.identifier);
        if !disagreement {
            return Some(first);
        }

        // Mirrors diverged (another writer, partial clear). Most recent
        // capture wins; priority order breaks ties.
        let mut winner = &found[0];
        for candidate in &found[1..] {
            if candidate.captured_at > winner.captured_at {
                winner = candidate;
            }
        }
        let winner = winner.clone();
        debug!(
            "attribution mirrors disagree, keeping record captured at {}",
            winner.captured_at
        );
        self.write(&winner);
        Some(winner)
    }

    pub fn clear(&self) {
        for backend in &self.backends {
            if let Err(e) = backend.clear(&self.key) {
                debug!("storage clear skipped: {}", e);
            }
        }
    }
}
