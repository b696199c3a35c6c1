use std::time::Duration;

use log::debug;
use nanoid::nanoid;
use rand::Rng;
use serde::Serialize;

use crate::tracker::error::TrackerError;

/// How a conversion is attributed: a stored click identifier (confident)
/// or a device fingerprint (provisional).
#[derive(Debug, Clone, PartialEq)]
pub enum VisitorKey {
    Click(String),
    Device(String),
}

/// The wire payload of one conversion beacon. `event_id` is minted client
/// side so the collection endpoint can deduplicate a retried delivery.
#[derive(Serialize, Debug, Clone)]
pub struct BeaconPayload {
    pub event_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    pub partner_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub timestamp: i64,
}

impl BeaconPayload {
    pub fn new(
        key: VisitorKey,
        partner_id: String,
        matched_pattern: Option<String>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        let (identifier, fingerprint) = match key {
            VisitorKey::Click(id) => (Some(id), None),
            VisitorKey::Device(fp) => (None, Some(fp)),
        };

        Self {
            event_id: nanoid!(),
            identifier,
            fingerprint,
            partner_id,
            matched_pattern,
            metadata,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Per-navigation conversion lifecycle. A navigation arms the machine, the
/// first pattern match fires it, and it stays fired until the next
/// navigation so a page can never convert twice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConversionPhase {
    Idle,
    Watching,
    Matched,
    Dispatched,
}

#[derive(Debug)]
pub struct ConversionState {
    phase: ConversionPhase,
}

impl ConversionState {
    pub fn new() -> Self {
        Self {
            phase: ConversionPhase::Idle,
        }
    }

    pub fn phase(&self) -> ConversionPhase {
        self.phase
    }

    pub fn begin_navigation(&mut self) {
        self.phase = ConversionPhase::Watching;
    }

    /// Arm-once: true only on the first match of the current navigation.
    pub fn try_match(&mut self) -> bool {
        if self.phase == ConversionPhase::Watching {
            self.phase = ConversionPhase::Matched;
            true
        } else {
            false
        }
    }

    pub fn mark_dispatched(&mut self) {
        self.phase = ConversionPhase::Dispatched;
    }
}

impl Default for ConversionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Delivery seam so the retry policy is testable without a network.
pub trait Transport {
    async fn send(&self, payload: &BeaconPayload) -> Result<(), TrackerError>;
}

/// Beacon delivery over HTTP POST.
pub struct HttpTransport {
    client: reqwest::Client,
    collect_url: String,
}

impl HttpTransport {
    pub fn new(collect_url: &str, timeout: Duration) -> Result<Self, TrackerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TrackerError::ConfigurationError(e.to_string()))?;

        Ok(Self {
            client,
            collect_url: collect_url.to_string(),
        })
    }
}

impl Transport for HttpTransport {
    async fn send(&self, payload: &BeaconPayload) -> Result<(), TrackerError> {
        let response = self
            .client
            .post(&self.collect_url)
            .json(payload)
            .send()
            .await
            .map_err(|e| TrackerError::NetworkFailure(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(TrackerError::NetworkFailure(format!(
                "collect endpoint returned {}",
                response.status()
            )))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Delivery {
    Delivered { attempts: u32 },
    Dropped,
}

/// Fire-and-forget delivery with a single retry. Conversions are
/// best-effort: after the retry the beacon is dropped, never queued.
pub struct Dispatcher<T: Transport> {
    transport: T,
    base_delay: Duration,
    jitter: Duration,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(transport: T, base_delay: Duration, jitter: Duration) -> Self {
        Self {
            transport,
            base_delay,
            jitter,
        }
    }

    pub async fn dispatch(&self, payload: &BeaconPayload) -> Delivery {
        match self.transport.send(payload).await {
            Ok(()) => return Delivery::Delivered { attempts: 1 },
            Err(e) => debug!("beacon {} failed, retrying: {}", payload.event_id, e),
        }

        tokio::time::sleep(self.backoff()).await;

        match self.transport.send(payload).await {
            Ok(()) => Delivery::Delivered { attempts: 2 },
            Err(e) => {
                debug!("beacon {} dropped: {}", payload.event_id, e);
                Delivery::Dropped
            }
        }
    }

    fn backoff(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_ms)
        };
        self.base_delay + Duration::from_millis(jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FlakyTransport {
        failures_left: Mutex<u32>,
        delivered: Mutex<Vec<String>>,
    }

    impl FlakyTransport {
        fn failing(times: u32) -> Self {
            Self {
                failures_left: Mutex::new(times),
                delivered: Mutex::new(Vec::new()),
            }
        }
    }

    impl Transport for FlakyTransport {
        async fn send(&self, payload: &BeaconPayload) -> Result<(), TrackerError> {
            let mut failures = self.failures_left.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(TrackerError::NetworkFailure("connection reset".into()));
            }
            self.delivered.lock().unwrap().push(payload.event_id.clone());
            Ok(())
        }
    }

    fn dispatcher(transport: FlakyTransport) -> Dispatcher<FlakyTransport> {
        Dispatcher::new(transport, Duration::from_millis(1), Duration::ZERO)
    }

    fn payload() -> BeaconPayload {
        BeaconPayload::new(
            VisitorKey::Click("clk_1".to_string()),
            "p_1".to_string(),
            None,
            None,
        )
    }

    #[tokio::test]
    async fn first_attempt_success_needs_no_retry() {
        let dispatcher = dispatcher(FlakyTransport::failing(0));
        let outcome = dispatcher.dispatch(&payload()).await;
        assert_eq!(outcome, Delivery::Delivered { attempts: 1 });
        assert_eq!(dispatcher.transport.delivered.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn one_failure_is_retried_and_delivered_once() {
        let dispatcher = dispatcher(FlakyTransport::failing(1));
        let outcome = dispatcher.dispatch(&payload()).await;
        assert_eq!(outcome, Delivery::Delivered { attempts: 2 });
        // Exactly one delivery lands despite the retry.
        assert_eq!(dispatcher.transport.delivered.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn persistent_failure_drops_after_one_retry() {
        let dispatcher = dispatcher(FlakyTransport::failing(2));
        let outcome = dispatcher.dispatch(&payload()).await;
        assert_eq!(outcome, Delivery::Dropped);
        assert!(dispatcher.transport.delivered.lock().unwrap().is_empty());
        // Both attempts were consumed, no third one happens.
        assert_eq!(*dispatcher.transport.failures_left.lock().unwrap(), 0);
    }

    #[test]
    fn state_machine_fires_once_per_navigation() {
        let mut state = ConversionState::new();
        assert_eq!(state.phase(), ConversionPhase::Idle);

        state.begin_navigation();
        assert!(state.try_match());
        state.mark_dispatched();
        assert!(!state.try_match());
        assert_eq!(state.phase(), ConversionPhase::Dispatched);

        state.begin_navigation();
        assert!(state.try_match());
    }

    #[test]
    fn payload_keys_are_mutually_exclusive() {
        let confident = payload();
        assert!(confident.identifier.is_some());
        assert!(confident.fingerprint.is_none());

        let provisional = BeaconPayload::new(
            VisitorKey::Device("fp".to_string()),
            "p_1".to_string(),
            None,
            None,
        );
        assert!(provisional.identifier.is_none());
        assert!(provisional.fingerprint.is_some());
    }
}
