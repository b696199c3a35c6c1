pub mod capture;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fingerprint;
pub mod matcher;
pub mod record;
pub mod storage;
pub mod watcher;

#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use log::{debug, info, warn};
use url::Url;

use crate::tracker::capture::capture_from_url;
use crate::tracker::dispatch::{
    BeaconPayload, ConversionState, Delivery, Dispatcher, HttpTransport, Transport, VisitorKey,
};
use crate::tracker::fingerprint::compute_fingerprint;
use crate::tracker::matcher::PatternSet;
use crate::tracker::record::StorageRecord;
use crate::tracker::storage::cookie::{CookieAttributes, CookieJar, CookieStore, SameSite};
use crate::tracker::storage::local::LocalStore;
use crate::tracker::storage::session::SessionStore;
use crate::tracker::storage::{StorageBackend, StorageStack};

pub use crate::tracker::config::TrackerConfig;
pub use crate::tracker::error::TrackerError;
pub use crate::tracker::fingerprint::DeviceSignals;

static GLOBAL: OnceLock<Tracker> = OnceLock::new();

/// The attribution tracker embedded by partner integrations.
///
/// One instance per process, armed with explicit `init`. Nothing in here
/// ever panics or returns an error into the host: capture, persistence and
/// dispatch all degrade to a logged no-op.
pub struct Tracker<T: Transport = HttpTransport> {
    config: TrackerConfig,
    patterns: PatternSet,
    storage: StorageStack,
    dispatcher: Dispatcher<T>,
    cookie_jar: Arc<Mutex<CookieJar>>,
    watcher: Mutex<watcher::NavigationWatcher>,
    state: Mutex<ConversionState>,
    debug: AtomicBool,
}

impl Tracker<HttpTransport> {
    /// Initialize the process-wide tracker. A repeated init never
    /// re-configures: the existing instance is returned and the new config
    /// is dropped with a warning.
    pub fn init(config: TrackerConfig) -> Result<&'static Tracker, TrackerError> {
        if let Some(existing) = GLOBAL.get() {
            warn!("tracker already initialized; ignoring repeated init");
            return Ok(existing);
        }

        let transport = HttpTransport::new(&config.collect_url, config.request_timeout)?;
        let tracker = Self::with_transport(config, transport)?;
        Ok(GLOBAL.get_or_init(move || tracker))
    }

    pub fn global() -> Option<&'static Tracker> {
        GLOBAL.get()
    }
}

impl<T: Transport> Tracker<T> {
    /// Build a tracker with the default backend stack: cookie, then the
    /// durable local file when configured, then the in-process session
    /// tier.
    pub fn with_transport(config: TrackerConfig, transport: T) -> Result<Self, TrackerError> {
        let cookie_jar = Arc::new(Mutex::new(CookieJar::new()));

        let attributes = match &config.cookie_host {
            Some(host) => CookieAttributes::first_party(host, config.ttl_secs()),
            None => CookieAttributes {
                domain: None,
                max_age_secs: config.ttl_secs(),
                secure: true,
                same_site: SameSite::Lax,
            },
        };

        let mut backends: Vec<Box<dyn StorageBackend>> = Vec::new();
        backends.push(Box::new(CookieStore::new(cookie_jar.clone(), attributes)));
        if let Some(path) = &config.local_store_path {
            backends.push(Box::new(LocalStore::new(path.clone())));
        }
        backends.push(Box::new(SessionStore::new()));

        Self::with_parts(config, transport, cookie_jar, backends)
    }

    /// Build a tracker over an explicit backend list. This is the seam the
    /// tests use to simulate unavailable storage.
    pub fn with_parts(
        config: TrackerConfig,
        transport: T,
        cookie_jar: Arc<Mutex<CookieJar>>,
        backends: Vec<Box<dyn StorageBackend>>,
    ) -> Result<Self, TrackerError> {
        let patterns = PatternSet::parse(&config.conversion_patterns)?;
        let storage = StorageStack::new(&config.namespace, backends);
        let dispatcher = Dispatcher::new(transport, config.retry_base_delay, config.retry_jitter);

        if config.partner_id.is_none() {
            warn!("no partner id configured; conversions will not be dispatched");
        }

        let debug = AtomicBool::new(config.debug);
        Ok(Self {
            config,
            patterns,
            storage,
            dispatcher,
            cookie_jar,
            watcher: Mutex::new(watcher::NavigationWatcher::new()),
            state: Mutex::new(ConversionState::new()),
            debug,
        })
    }

    /// Feed one page view / navigation into the tracker: capture a click
    /// id if the URL carries one, persist it, then run conversion
    /// detection. Returns the beacon outcome when a conversion fired.
    pub async fn observe_navigation(&self, url: &Url) -> Option<Delivery> {
        let navigation = match self.watcher.lock() {
            Ok(mut watcher) => watcher.observe(url)?,
            Err(_) => return None,
        };

        if let Ok(mut state) = self.state.lock() {
            state.begin_navigation();
        }

        self.capture(&navigation);

        let matched = self.patterns.first_match(navigation.path())?.to_string();

        let armed = match self.state.lock() {
            Ok(mut state) => state.try_match(),
            Err(_) => false,
        };
        if !armed {
            return None;
        }
        self.note(&format!("conversion path matched '{}'", matched));

        self.send_conversion(Some(matched), None).await
    }

    /// Explicit conversion reporting. Skips pattern matching entirely and
    /// dispatches with the caller's metadata, whatever the current path.
    pub async fn track_conversion(&self, metadata: Option<serde_json::Value>) -> Option<Delivery> {
        self.send_conversion(None, metadata).await
    }

    /// Drive navigation watching by polling a URL source. The host spawns
    /// this (or selects over it) and drops it to stop watching.
    pub async fn watch<F>(&self, mut source: F, interval: Duration)
    where
        F: FnMut() -> Url,
    {
        loop {
            let url = source();
            self.observe_navigation(&url).await;
            tokio::time::sleep(interval).await;
        }
    }

    pub fn set_debug(&self, enabled: bool) {
        self.debug.store(enabled, Ordering::Relaxed);
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    /// The currently stored attribution record, if any backend has a valid
    /// one.
    pub fn stored_record(&self) -> Option<StorageRecord> {
        self.storage.read()
    }

    /// Drop the attribution record from every backend.
    pub fn clear(&self) {
        self.storage.clear();
    }

    /// The `Set-Cookie` header for the attribution cookie, for hosts that
    /// relay the cookie tier through their own HTTP responses.
    pub fn set_cookie_header(&self) -> Option<String> {
        let jar = self.cookie_jar.lock().ok()?;
        jar.format_set_cookie(self.storage.key())
    }

    fn capture(&self, url: &Url) {
        let Some(click) =
            capture_from_url(url, &self.config.click_param, &self.config.partner_param)
        else {
            return;
        };

        // Re-capturing the identifier we already hold keeps the original
        // captured_at; only a different click replaces the record.
        if let Some(existing) = self.storage.read() {
            if existing.identifier == click.identifier {
                return;
            }
        }

        let partner_id = click.partner_id.or_else(|| self.config.partner_id.clone());
        let record = StorageRecord::new(click.identifier, partner_id, self.config.ttl_days);
        let written = self.storage.write(&record);
        self.note(&format!(
            "captured click id into {} backend(s)",
            written
        ));
    }

    async fn send_conversion(
        &self,
        matched_pattern: Option<String>,
        metadata: Option<serde_json::Value>,
    ) -> Option<Delivery> {
        let stored = self.storage.read();

        let partner_id = stored
            .as_ref()
            .and_then(|record| record.partner_id.clone())
            .or_else(|| self.config.partner_id.clone());
        let Some(partner_id) = partner_id else {
            debug!("conversion detected but no partner id is known; dispatch skipped");
            return None;
        };

        let key = match stored {
            Some(record) => VisitorKey::Click(record.identifier),
            None => match &self.config.device_signals {
                Some(signals) => VisitorKey::Device(compute_fingerprint(signals)),
                None => {
                    debug!("no stored identifier and no device signals; dispatch skipped");
                    return None;
                }
            },
        };

        let payload = BeaconPayload::new(key, partner_id, matched_pattern, metadata);
        self.note(&format!("dispatching conversion beacon {}", payload.event_id));

        let delivery = self.dispatcher.dispatch(&payload).await;

        if let Ok(mut state) = self.state.lock() {
            state.mark_dispatched();
        }
        Some(delivery)
    }

    // Routine diagnostics stay at debug level; the host's debug toggle
    // promotes them to info so they show up without a filter change.
    fn note(&self, message: &str) {
        if self.debug_enabled() {
            info!("{}", message);
        } else {
            debug!("{}", message);
        }
    }
}

/// Report a conversion through the process-wide tracker. A call before
/// `init` is a logged no-op, never an error.
pub async fn track_conversion(metadata: Option<serde_json::Value>) -> Option<Delivery> {
    match Tracker::global() {
        Some(tracker) => tracker.track_conversion(metadata).await,
        None => {
            debug!("track_conversion called before tracker init; ignored");
            None
        }
    }
}

/// Toggle verbose diagnostics on the process-wide tracker.
pub fn set_debug(enabled: bool) {
    if let Some(tracker) = Tracker::global() {
        tracker.set_debug(enabled);
    }
}
