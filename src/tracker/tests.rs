use std::sync::{Arc, Mutex};
use std::time::Duration;

use url::Url;

use super::dispatch::{BeaconPayload, Delivery, Transport};
use super::error::TrackerError;
use super::storage::StorageBackend;
use super::storage::cookie::CookieJar;
use super::storage::session::SessionStore;
use super::{DeviceSignals, Tracker, TrackerConfig};

#[derive(Default)]
struct TransportLog {
    fail_times: Mutex<u32>,
    sent: Mutex<Vec<BeaconPayload>>,
}

impl TransportLog {
    fn sent(&self) -> Vec<BeaconPayload> {
        self.sent.lock().unwrap().clone()
    }
}

struct MockTransport {
    log: Arc<TransportLog>,
}

impl Transport for MockTransport {
    async fn send(&self, payload: &BeaconPayload) -> Result<(), TrackerError> {
        let mut failures = self.log.fail_times.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(TrackerError::NetworkFailure("simulated outage".into()));
        }
        self.log.sent.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

struct DisabledBackend;

impl StorageBackend for DisabledBackend {
    fn name(&self) -> &'static str {
        "disabled"
    }

    fn write(&self, _key: &str, _value: &str) -> Result<(), TrackerError> {
        Err(TrackerError::unavailable("disabled", "storage blocked"))
    }

    fn read(&self, _key: &str) -> Result<Option<String>, TrackerError> {
        Err(TrackerError::unavailable("disabled", "storage blocked"))
    }

    fn clear(&self, _key: &str) -> Result<(), TrackerError> {
        Err(TrackerError::unavailable("disabled", "storage blocked"))
    }
}

fn parse(raw: &str) -> Url {
    Url::parse(raw).unwrap()
}

fn signals() -> DeviceSignals {
    DeviceSignals {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64)".to_string(),
        language: "da-DK".to_string(),
        timezone_offset_minutes: -120,
        viewport: (1920, 1080),
        platform: "Linux".to_string(),
    }
}

fn config() -> TrackerConfig {
    let mut config = TrackerConfig::new("https://collect.dinelportal.dk/t/collect")
        .with_partner("nordpool")
        .with_patterns(["/thank-you", "/confirmation/*"])
        .with_cookie_host("www.dinelportal.dk");
    config.retry_base_delay = Duration::from_millis(1);
    config.retry_jitter = Duration::ZERO;
    config
}

fn tracker(log: Arc<TransportLog>, config: TrackerConfig) -> Tracker<MockTransport> {
    Tracker::with_transport(config, MockTransport { log }).unwrap()
}

fn unavailable_tracker(log: Arc<TransportLog>, config: TrackerConfig) -> Tracker<MockTransport> {
    Tracker::with_parts(
        config,
        MockTransport { log },
        Arc::new(Mutex::new(CookieJar::new())),
        vec![
            Box::new(DisabledBackend),
            Box::new(DisabledBackend),
            Box::new(DisabledBackend),
        ],
    )
    .unwrap()
}

#[tokio::test]
async fn captured_click_is_immediately_readable() {
    let log = Arc::new(TransportLog::default());
    let tracker = tracker(log, config());

    tracker
        .observe_navigation(&parse("https://www.dinelportal.dk/el?click_id=clk_42"))
        .await;

    let record = tracker.stored_record().unwrap();
    assert_eq!(record.identifier, "clk_42");
    assert!(!record.is_expired());
}

#[tokio::test]
async fn recapture_of_same_identifier_is_idempotent() {
    let log = Arc::new(TransportLog::default());
    let tracker = tracker(log, config());

    tracker
        .observe_navigation(&parse("https://www.dinelportal.dk/el?click_id=clk_42"))
        .await;
    let first = tracker.stored_record().unwrap();

    tracker
        .observe_navigation(&parse("https://www.dinelportal.dk/priser?click_id=clk_42"))
        .await;
    let second = tracker.stored_record().unwrap();

    assert_eq!(first.identifier, second.identifier);
    assert_eq!(first.captured_at, second.captured_at);
}

#[tokio::test]
async fn navigation_without_click_id_keeps_existing_record() {
    let log = Arc::new(TransportLog::default());
    let tracker = tracker(log, config());

    tracker
        .observe_navigation(&parse("https://www.dinelportal.dk/el?click_id=clk_42"))
        .await;
    tracker
        .observe_navigation(&parse("https://www.dinelportal.dk/priser"))
        .await;

    assert_eq!(tracker.stored_record().unwrap().identifier, "clk_42");
}

#[tokio::test]
async fn a_new_click_replaces_the_old_record() {
    let log = Arc::new(TransportLog::default());
    let tracker = tracker(log, config());

    tracker
        .observe_navigation(&parse("https://www.dinelportal.dk/el?click_id=clk_old"))
        .await;
    tracker
        .observe_navigation(&parse("https://www.dinelportal.dk/el2?click_id=clk_new"))
        .await;

    assert_eq!(tracker.stored_record().unwrap().identifier, "clk_new");
}

#[tokio::test]
async fn pattern_match_dispatches_exactly_one_beacon() {
    let log = Arc::new(TransportLog::default());
    let tracker = tracker(log.clone(), config());

    tracker
        .observe_navigation(&parse("https://www.dinelportal.dk/el?click_id=clk_42"))
        .await;
    let outcome = tracker
        .observe_navigation(&parse("https://www.dinelportal.dk/confirmation/123"))
        .await;
    assert_eq!(outcome, Some(Delivery::Delivered { attempts: 1 }));

    // Staying on the page must not convert again.
    tracker
        .observe_navigation(&parse("https://www.dinelportal.dk/confirmation/123"))
        .await;

    let sent = log.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].matched_pattern.as_deref(), Some("/confirmation/*"));
    assert_eq!(sent[0].identifier.as_deref(), Some("clk_42"));
    assert!(sent[0].fingerprint.is_none());
}

#[tokio::test]
async fn explicit_api_dispatches_regardless_of_path() {
    let log = Arc::new(TransportLog::default());
    let tracker = tracker(log.clone(), config());

    tracker
        .observe_navigation(&parse("https://www.dinelportal.dk/el?click_id=clk_42"))
        .await;
    let outcome = tracker
        .track_conversion(Some(serde_json::json!({"orderId": "abc"})))
        .await;
    assert_eq!(outcome, Some(Delivery::Delivered { attempts: 1 }));

    let sent = log.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].matched_pattern.is_none());
    assert_eq!(sent[0].metadata.as_ref().unwrap()["orderId"], "abc");
}

#[tokio::test]
async fn network_failure_is_retried_then_delivered_once() {
    let log = Arc::new(TransportLog::default());
    *log.fail_times.lock().unwrap() = 1;
    let tracker = tracker(log.clone(), config());

    tracker
        .observe_navigation(&parse("https://www.dinelportal.dk/el?click_id=clk_42"))
        .await;
    let outcome = tracker
        .observe_navigation(&parse("https://www.dinelportal.dk/thank-you"))
        .await;

    assert_eq!(outcome, Some(Delivery::Delivered { attempts: 2 }));
    assert_eq!(log.sent().len(), 1);
}

#[tokio::test]
async fn persistent_network_failure_drops_the_beacon() {
    let log = Arc::new(TransportLog::default());
    *log.fail_times.lock().unwrap() = 2;
    let tracker = tracker(log.clone(), config());

    tracker
        .observe_navigation(&parse("https://www.dinelportal.dk/el?click_id=clk_42"))
        .await;
    let outcome = tracker
        .observe_navigation(&parse("https://www.dinelportal.dk/thank-you"))
        .await;

    assert_eq!(outcome, Some(Delivery::Dropped));
    assert!(log.sent().is_empty());
}

#[tokio::test]
async fn unavailable_storage_falls_back_to_a_stable_fingerprint() {
    let log = Arc::new(TransportLog::default());
    let tracker = unavailable_tracker(log.clone(), config().with_device_signals(signals()));

    tracker
        .observe_navigation(&parse("https://www.dinelportal.dk/el?click_id=clk_42"))
        .await;
    assert!(tracker.stored_record().is_none());

    tracker.track_conversion(None).await;
    tracker.track_conversion(None).await;

    let sent = log.sent();
    assert_eq!(sent.len(), 2);
    let fp = sent[0].fingerprint.clone().unwrap();
    assert!(!fp.is_empty());
    assert_eq!(sent[1].fingerprint.as_ref(), Some(&fp));
    assert!(sent[0].identifier.is_none());
}

#[tokio::test]
async fn expired_record_is_absent_and_attribution_turns_provisional() {
    let log = Arc::new(TransportLog::default());

    let session = SessionStore::new();
    let mut expired = super::record::StorageRecord::new(
        "clk_stale".to_string(),
        Some("nordpool".to_string()),
        90,
    );
    expired.expires_at = expired.captured_at - 1;
    session
        .write("elspor_attrib", &expired.to_json().unwrap())
        .unwrap();

    let tracker = Tracker::with_parts(
        config().with_device_signals(signals()),
        MockTransport { log: log.clone() },
        Arc::new(Mutex::new(CookieJar::new())),
        vec![Box::new(session)],
    )
    .unwrap();

    assert!(tracker.stored_record().is_none());

    tracker.track_conversion(None).await;
    let sent = log.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].identifier.is_none());
    assert!(sent[0].fingerprint.is_some());
}

#[tokio::test]
async fn missing_partner_id_skips_dispatch_but_still_persists() {
    let log = Arc::new(TransportLog::default());
    let mut config = config();
    config.partner_id = None;
    let tracker = tracker(log.clone(), config);

    // No partner in the URL either, so there is nobody to attribute to.
    tracker
        .observe_navigation(&parse("https://www.dinelportal.dk/el?click_id=clk_42"))
        .await;
    let outcome = tracker
        .observe_navigation(&parse("https://www.dinelportal.dk/thank-you"))
        .await;

    assert_eq!(outcome, None);
    assert!(log.sent().is_empty());
    assert_eq!(tracker.stored_record().unwrap().identifier, "clk_42");
}

#[tokio::test]
async fn partner_id_from_the_url_wins_over_config() {
    let log = Arc::new(TransportLog::default());
    let tracker = tracker(log.clone(), config());

    tracker
        .observe_navigation(&parse(
            "https://www.dinelportal.dk/el?click_id=clk_42&partner=vindstoed",
        ))
        .await;
    tracker
        .observe_navigation(&parse("https://www.dinelportal.dk/thank-you"))
        .await;

    let sent = log.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].partner_id, "vindstoed");
}

#[tokio::test]
async fn cookie_header_reflects_the_embed_contract() {
    let log = Arc::new(TransportLog::default());
    let tracker = tracker(log, config());

    tracker
        .observe_navigation(&parse("https://www.dinelportal.dk/el?click_id=clk_42"))
        .await;

    let header = tracker.set_cookie_header().unwrap();
    assert!(header.starts_with("elspor_attrib="));
    assert!(header.contains("Domain=dinelportal.dk"));
    assert!(header.contains("; Secure"));
    assert!(header.contains("SameSite=Lax"));
    assert!(header.contains(&format!("Max-Age={}", 90 * 24 * 60 * 60)));
}

#[tokio::test]
async fn poll_driver_sees_the_navigation_change() {
    let log = Arc::new(TransportLog::default());
    let tracker = tracker(log.clone(), config());

    let urls = [
        parse("https://www.dinelportal.dk/el?click_id=clk_42"),
        parse("https://www.dinelportal.dk/thank-you"),
    ];
    let step = std::cell::Cell::new(0usize);
    let source = || {
        let i = step.get();
        step.set((i + 1).min(1));
        urls[i].clone()
    };

    tokio::select! {
        _ = tracker.watch(source, Duration::from_millis(1)) => {}
        _ = tokio::time::sleep(Duration::from_millis(50)) => {}
    }

    let sent = log.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].identifier.as_deref(), Some("clk_42"));
    assert_eq!(sent[0].matched_pattern.as_deref(), Some("/thank-you"));
}

#[test]
fn invalid_patterns_are_a_configuration_error() {
    let log = Arc::new(TransportLog::default());
    let bad = config().with_patterns(["/a/*/b"]);
    assert!(Tracker::with_transport(bad, MockTransport { log }).is_err());
}

#[tokio::test]
async fn repeated_init_returns_the_existing_instance() {
    let first = Tracker::init(config()).unwrap();
    let second = Tracker::init(config().with_partner("someone-else")).unwrap();
    assert!(std::ptr::eq(first, second));
    assert!(Tracker::global().is_some());

    // The module-level API rides on the same instance and stays a no-op
    // when there is nothing to attribute, not an error.
    super::set_debug(true);
    assert!(first.debug_enabled());
    assert_eq!(super::track_conversion(None).await, None);
}

#[tokio::test]
async fn debug_toggle_flips_at_runtime() {
    let log = Arc::new(TransportLog::default());
    let tracker = tracker(log, config().with_debug(false));
    assert!(!tracker.debug_enabled());
    tracker.set_debug(true);
    assert!(tracker.debug_enabled());
}
