//! The sensor bus capability consumed by the orchestrator.

use async_trait::async_trait;
use tokio::sync::broadcast;

/// One inbound message received from the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl BusMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Publish/subscribe transport connecting the service to field devices.
#[async_trait]
pub trait SensorBus: Send + Sync {
    /// Publish `payload` on `topic`.
    ///
    /// Fails fast when the transport is down; nothing is queued.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), SensorBusError>;

    /// Receive every message arriving on the subscribed topics.
    fn subscribe(&self) -> broadcast::Receiver<BusMessage>;

    /// Whether the transport currently has a live connection.
    fn is_connected(&self) -> bool;
}

/// Errors surfaced by sensor bus implementations.
#[derive(Debug, thiserror::Error)]
pub enum SensorBusError {
    /// No live connection to the transport.
    #[error("Sensor bus not connected")]
    NotConnected,

    /// Failed to establish the connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A protocol-level error on an established connection.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A frame could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
