//! In-process sensor bus.
//!
//! [`MemorySensorBus`] keeps every published message, lets callers inject
//! inbound messages as if a device had sent them, and can be told to fail
//! publishes or report a disconnected transport. Used by tests and by
//! local runs without a gateway (optionally with the simulated device in
//! [`run_simulated_device`]).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use soilsense_core::topics::{response_topic, topic_matches};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::bus::{BusMessage, SensorBus, SensorBusError};

const CHANNEL_CAPACITY: usize = 256;

/// Loopback implementation of [`SensorBus`].
pub struct MemorySensorBus {
    /// Filters an injected message must match; empty accepts everything.
    filters: Vec<String>,
    inbound_tx: broadcast::Sender<BusMessage>,
    outbound_tx: broadcast::Sender<BusMessage>,
    published: Mutex<Vec<BusMessage>>,
    fail_publish: AtomicBool,
    connected: AtomicBool,
}

impl MemorySensorBus {
    /// A connected bus accepting every injected topic.
    pub fn new() -> Self {
        Self::with_filters(Vec::new())
    }

    /// A connected bus delivering only injected topics matching `filters`.
    pub fn with_filters(filters: Vec<String>) -> Self {
        let (inbound_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (outbound_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            filters,
            inbound_tx,
            outbound_tx,
            published: Mutex::new(Vec::new()),
            fail_publish: AtomicBool::new(false),
            connected: AtomicBool::new(true),
        }
    }

    /// Deliver a message to subscribers as if it arrived from a device.
    ///
    /// Returns `false` when no filter matches the topic.
    pub fn inject(&self, topic: &str, payload: impl Into<Vec<u8>>) -> bool {
        if !self.filters.is_empty() && !self.filters.iter().any(|f| topic_matches(f, topic)) {
            tracing::debug!(topic, "Injected message matches no subscription");
            return false;
        }
        let _ = self.inbound_tx.send(BusMessage::new(topic, payload));
        true
    }

    /// Every message published so far, oldest first.
    pub fn published(&self) -> Vec<BusMessage> {
        self.published
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Observe publishes as they happen.
    pub fn watch_published(&self) -> broadcast::Receiver<BusMessage> {
        self.outbound_tx.subscribe()
    }

    /// Make subsequent publishes fail with [`SensorBusError::NotConnected`].
    pub fn set_publish_failure(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl Default for MemorySensorBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SensorBus for MemorySensorBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), SensorBusError> {
        if self.fail_publish.load(Ordering::SeqCst) || !self.is_connected() {
            return Err(SensorBusError::NotConnected);
        }
        let msg = BusMessage::new(topic, payload);
        self.published
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(msg.clone());
        let _ = self.outbound_tx.send(msg);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.inbound_tx.subscribe()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Answer every measurement request published on `bus` with a canned
/// reading after `delay`, the way a field device would.
///
/// Request topics look like `<ns>/read/request/<treeID>/<jobID>`; anything
/// else is ignored. Runs until `cancel` fires or the bus is dropped.
pub async fn run_simulated_device(
    bus: std::sync::Arc<MemorySensorBus>,
    namespace: String,
    delay: Duration,
    cancel: CancellationToken,
) {
    let mut requests = bus.watch_published();
    let prefix = format!("{namespace}/read/request/");
    tracing::info!(namespace = %namespace, "Simulated sensor device started");

    loop {
        let request = tokio::select! {
            _ = cancel.cancelled() => break,
            received = requests.recv() => match received {
                Ok(msg) => msg,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Simulated device lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        };

        let Some(rest) = request.topic.strip_prefix(&prefix) else {
            continue;
        };
        let Some((tree_id, job_id)) = rest.split_once('/') else {
            continue;
        };

        let topic = response_topic(&namespace, job_id);
        let payload = json!({
            "jobID": job_id,
            "treeID": tree_id,
            "timestamp": reading_timestamp(),
            "N_ppm": 123.0,
            "P_ppm": 47.5,
            "K_ppm": 178.2,
        })
        .to_string();

        let reply_bus = std::sync::Arc::clone(&bus);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tracing::info!(topic = %topic, "Simulated device replying");
            reply_bus.inject(&topic, payload);
        });
    }

    tracing::info!("Simulated sensor device stopped");
}

fn reading_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
