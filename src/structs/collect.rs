use serde::{Deserialize, Serialize};
use validator::Validate;

/// JSON body of a `POST /t/collect` beacon.
#[derive(Deserialize, Serialize, Validate)]
pub struct CollectRequest {
    #[validate(length(min = 1, max = 64, message = "event_id must be 1-64 characters"))]
    pub event_id: String,
    #[validate(length(min = 1, max = 256, message = "identifier must be 1-256 characters"))]
    pub identifier: Option<String>,
    #[validate(length(min = 1, max = 256, message = "fingerprint must be 1-256 characters"))]
    pub fingerprint: Option<String>,
    #[validate(length(min = 1, max = 64, message = "partner_id must be 1-64 characters"))]
    pub partner_id: String,
    pub matched_pattern: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub timestamp: i64,
}

impl CollectRequest {
    pub fn has_attribution_key(&self) -> bool {
        self.identifier.is_some() || self.fingerprint.is_some()
    }
}

/// Query-string variant for the pixel-style `GET /t/collect` beacon.
/// Metadata arrives JSON-encoded in a single parameter, if at all.
#[derive(Deserialize)]
pub struct PixelRequest {
    pub event_id: String,
    pub identifier: Option<String>,
    pub fingerprint: Option<String>,
    pub partner_id: String,
    pub matched_pattern: Option<String>,
    pub metadata: Option<String>,
    pub timestamp: Option<i64>,
}

impl PixelRequest {
    pub fn into_collect_request(self) -> CollectRequest {
        let metadata = self
            .metadata
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());

        CollectRequest {
            event_id: self.event_id,
            identifier: self.identifier,
            fingerprint: self.fingerprint,
            partner_id: self.partner_id,
            matched_pattern: self.matched_pattern,
            metadata,
            timestamp: self
                .timestamp
                .unwrap_or_else(|| chrono::Utc::now().timestamp_millis()),
        }
    }
}

#[derive(Serialize)]
pub struct CollectResponse {
    pub accepted: bool,
    pub event_id: String,
}

#[derive(Serialize)]
pub struct PartnerAnalyticsResponse {
    pub partner_id: String,
    pub conversions: u64,
    pub confident: u64,
    pub provisional: u64,
    pub unique_reporters: usize,
}

#[derive(Deserialize)]
pub struct ConversionListParams {
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct ConversionListEntry {
    pub id: Option<String>,
    pub event_id: String,
    pub identifier: Option<String>,
    pub provisional: bool,
    pub matched_pattern: Option<String>,
    pub timestamp: i64,
    pub received_at: i64,
}
