use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::structs::collect::CollectRequest;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ConversionRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub event_id: String, // Client-minted, deduplicates retried beacons
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    pub partner_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub provisional: bool, // Fingerprint-attributed, not click-attributed
    pub timestamp: i64,    // Client clock at dispatch
    pub received_at: i64,  // Our clock at intake
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reporter_hash: Option<String>, // Hashed reporter IP
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl ConversionRecord {
    pub fn from_beacon(
        payload: CollectRequest,
        reporter_hash: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        let provisional = payload.identifier.is_none();

        Self {
            id: None,
            event_id: payload.event_id,
            identifier: payload.identifier,
            fingerprint: payload.fingerprint,
            partner_id: payload.partner_id,
            matched_pattern: payload.matched_pattern,
            metadata: payload.metadata,
            provisional,
            timestamp: payload.timestamp,
            received_at: chrono::Utc::now().timestamp_millis(),
            reporter_hash,
            user_agent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(identifier: Option<&str>, fingerprint: Option<&str>) -> CollectRequest {
        CollectRequest {
            event_id: "evt_1".to_string(),
            identifier: identifier.map(String::from),
            fingerprint: fingerprint.map(String::from),
            partner_id: "nordpool".to_string(),
            matched_pattern: None,
            metadata: None,
            timestamp: 1,
        }
    }

    #[test]
    fn click_attribution_is_confident() {
        let record = ConversionRecord::from_beacon(payload(Some("clk_1"), None), None, None);
        assert!(!record.provisional);
        assert!(record.received_at >= record.timestamp);
    }

    #[test]
    fn fingerprint_attribution_is_provisional() {
        let record = ConversionRecord::from_beacon(payload(None, Some("fp")), None, None);
        assert!(record.provisional);
    }
}
