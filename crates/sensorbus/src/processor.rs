//! Inbound gateway frame processing.
//!
//! Raw WebSocket frames are parsed into [`GatewayFrame`]s; `message`
//! frames become [`BusMessage`]s on the inbound broadcast channel and
//! everything else is logged.

use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::bus::BusMessage;
use crate::messages::{parse_frame, GatewayFrame};

/// Whether the session should keep reading after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Continue,
    Closed,
}

/// Handle one frame read from the gateway stream.
pub fn process_frame(
    frame: Result<Message, tungstenite::Error>,
    inbound_tx: &broadcast::Sender<BusMessage>,
) -> FrameOutcome {
    match frame {
        Ok(Message::Text(text)) => {
            handle_text_frame(&text, inbound_tx);
            FrameOutcome::Continue
        }
        Ok(Message::Binary(_)) => {
            tracing::trace!("Ignoring binary frame from sensor gateway");
            FrameOutcome::Continue
        }
        Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => FrameOutcome::Continue,
        Ok(Message::Close(frame)) => {
            tracing::info!(?frame, "Sensor gateway closed the connection");
            FrameOutcome::Closed
        }
        Err(e) => {
            tracing::error!(error = %e, "Sensor gateway receive error");
            FrameOutcome::Closed
        }
    }
}

/// Dispatch a single text frame.
pub fn handle_text_frame(text: &str, inbound_tx: &broadcast::Sender<BusMessage>) {
    match parse_frame(text) {
        Ok(GatewayFrame::Message { topic, payload }) => {
            tracing::debug!(topic = %topic, bytes = payload.len(), "Sensor bus message");
            // No receivers only means the orchestrator is not running yet.
            let _ = inbound_tx.send(BusMessage::new(topic, payload));
        }
        Ok(GatewayFrame::Suback { topic }) => {
            tracing::info!(topic = %topic, "Sensor gateway subscription confirmed");
        }
        Ok(GatewayFrame::Error { reason }) => {
            tracing::warn!(reason = %reason, "Sensor gateway reported an error");
        }
        Ok(other @ (GatewayFrame::Subscribe { .. } | GatewayFrame::Publish { .. })) => {
            tracing::debug!(frame = ?other, "Ignoring client-only frame from gateway");
        }
        Err(e) => {
            tracing::warn!(error = %e, raw_frame = %text, "Failed to parse sensor gateway frame");
        }
    }
}
