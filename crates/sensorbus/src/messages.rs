//! Sensor gateway frame types.
//!
//! The gateway exchanges JSON text frames tagged by `op`:
//! `{"op": "subscribe", "topic": "npk/read/response/+"}`,
//! `{"op": "publish", "topic": "...", "payload": "..."}`,
//! `{"op": "message", "topic": "...", "payload": "..."}`.

use serde::{Deserialize, Serialize};

/// Every frame the gateway understands, in either direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum GatewayFrame {
    /// Client -> gateway: start receiving messages matching `topic`.
    Subscribe { topic: String },

    /// Client -> gateway: publish `payload` on `topic`.
    Publish { topic: String, payload: String },

    /// Gateway -> client: a message arrived on `topic`.
    Message { topic: String, payload: String },

    /// Gateway -> client: the gateway acknowledged a subscription.
    Suback { topic: String },

    /// Gateway -> client: a request was rejected.
    Error { reason: String },
}

impl GatewayFrame {
    pub fn subscribe(topic: impl Into<String>) -> Self {
        GatewayFrame::Subscribe {
            topic: topic.into(),
        }
    }

    pub fn publish(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        GatewayFrame::Publish {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Encode as a JSON text frame.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Parse a gateway text frame into a typed frame.
///
/// Returns `Err` for malformed JSON or unknown `op` values.
/// Callers should log and continue.
pub fn parse_frame(text: &str) -> Result<GatewayFrame, serde_json::Error> {
    serde_json::from_str(text)
}
