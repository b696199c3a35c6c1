use serde::{Deserialize, Serialize};

/// The attribution record mirrored into every storage backend.
///
/// `captured_at` is fixed at first capture and survives re-captures of the
/// same identifier; only a different identifier replaces the record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StorageRecord {
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_id: Option<String>,
    pub captured_at: i64,
    pub expires_at: i64,
}

impl StorageRecord {
    pub fn new(identifier: String, partner_id: Option<String>, ttl_days: u32) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        let expires_at = now + (ttl_days as i64 * 24 * 60 * 60 * 1000);

        Self {
            identifier,
            partner_id,
            captured_at: now,
            expires_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        chrono::Utc::now().timestamp_millis() > self.expires_at
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a stored value. Anything that is not a valid record is treated
    /// as absent, never as an error state.
    pub fn from_json(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_record_is_not_expired() {
        let record = StorageRecord::new("clk_1".to_string(), None, 90);
        assert!(!record.is_expired());
        assert_eq!(
            record.expires_at - record.captured_at,
            90 * 24 * 60 * 60 * 1000
        );
    }

    #[test]
    fn past_expiry_is_expired() {
        let mut record = StorageRecord::new("clk_1".to_string(), None, 90);
        record.expires_at = record.captured_at - 1;
        assert!(record.is_expired());
    }

    #[test]
    fn malformed_values_parse_as_absent() {
        assert!(StorageRecord::from_json("not json").is_none());
        assert!(StorageRecord::from_json("{\"identifier\":42}").is_none());
        assert!(StorageRecord::from_json("").is_none());
    }

    #[test]
    fn serialized_record_parses_back() {
        let record = StorageRecord::new("clk_1".to_string(), Some("p_9".to_string()), 30);
        let raw = record.to_json().unwrap();
        assert_eq!(StorageRecord::from_json(&raw), Some(record));
    }
}
