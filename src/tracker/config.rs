use std::path::PathBuf;
use std::time::Duration;

use crate::tracker::fingerprint::DeviceSignals;

/// Everything the tracker is allowed to vary per integration.
///
/// A missing `partner_id` is legal configuration: capture and persistence
/// still run so the identifier survives, but conversion dispatch is skipped
/// because there is no partner to attribute to.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub collect_url: String,
    pub partner_id: Option<String>,
    pub click_param: String,
    pub partner_param: String,
    /// Prefix for every storage key and the cookie name, so the tracker
    /// never collides with the host's own use of the same backends.
    pub namespace: String,
    pub ttl_days: u32,
    pub conversion_patterns: Vec<String>,
    /// Host whose registrable domain scopes the first-party cookie.
    pub cookie_host: Option<String>,
    /// File path for the durable local backend. Unset skips that tier.
    pub local_store_path: Option<PathBuf>,
    /// Device signals for the fingerprint fallback. Unset means no
    /// provisional attribution when storage yields nothing.
    pub device_signals: Option<DeviceSignals>,
    pub retry_base_delay: Duration,
    pub retry_jitter: Duration,
    pub request_timeout: Duration,
    pub debug: bool,
}

impl TrackerConfig {
    pub fn new(collect_url: impl Into<String>) -> Self {
        Self {
            collect_url: collect_url.into(),
            partner_id: None,
            click_param: String::from("click_id"),
            partner_param: String::from("partner"),
            namespace: String::from("elspor"),
            ttl_days: 90,
            conversion_patterns: Vec::new(),
            cookie_host: None,
            local_store_path: None,
            device_signals: None,
            retry_base_delay: Duration::from_millis(400),
            retry_jitter: Duration::from_millis(250),
            request_timeout: Duration::from_secs(5),
            debug: false,
        }
    }

    pub fn with_partner(mut self, partner_id: impl Into<String>) -> Self {
        self.partner_id = Some(partner_id.into());
        self
    }

    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conversion_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cookie_host(mut self, host: impl Into<String>) -> Self {
        self.cookie_host = Some(host.into());
        self
    }

    pub fn with_local_store(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_store_path = Some(path.into());
        self
    }

    pub fn with_device_signals(mut self, signals: DeviceSignals) -> Self {
        self.device_signals = Some(signals);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_days as i64 * 24 * 60 * 60
    }
}
