use sha2::{Digest, Sha256};

const FINGERPRINT_SALT: &str = "elspor_fp_v1";

/// Stable, non-invasive device signals supplied by the embedding host.
///
/// The exact signal set is integration policy; whatever the host fills in
/// here is what the fingerprint is derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSignals {
    pub user_agent: String,
    pub language: String,
    pub timezone_offset_minutes: i32,
    pub viewport: (u32, u32),
    pub platform: String,
}

impl DeviceSignals {
    fn canonical(&self) -> String {
        format!(
            "{}|{}|{}|{}x{}|{}",
            self.user_agent,
            self.language,
            self.timezone_offset_minutes,
            self.viewport.0,
            self.viewport.1,
            self.platform
        )
    }
}

/// Derive a non-reversible summary of the device signals.
///
/// Pure: the same signals always hash to the same string, so two calls in
/// the same session agree. The result is only ever a provisional substitute
/// key and is never written back as a click identifier.
pub fn compute_fingerprint(signals: &DeviceSignals) -> String {
    let mut hasher = Sha256::new();
    hasher.update(FINGERPRINT_SALT.as_bytes());
    hasher.update(signals.canonical().as_bytes());
    let result = hasher.finalize();

    format!("{:x}", result)
}
