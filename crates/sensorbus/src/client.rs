//! WebSocket client for connecting to a sensor gateway.
//!
//! [`GatewayClient`] holds the connection configuration. Call
//! [`GatewayClient::connect`] to establish a live [`GatewayConnection`].

use tokio_tungstenite::{connect_async, MaybeTlsStream};

use crate::bus::SensorBusError;

/// Raw WebSocket stream to the gateway.
pub type GatewayStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Configuration handle for a sensor gateway.
pub struct GatewayClient {
    url: String,
}

/// A live WebSocket connection to the gateway.
pub struct GatewayConnection {
    /// Gateway URL this connection was opened against.
    pub url: String,
    /// The raw WebSocket stream for reading/writing frames.
    pub ws_stream: GatewayStream,
}

impl GatewayClient {
    /// * `url` - WebSocket URL, e.g. `ws://broker:9001/bus`.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Connect to the gateway WebSocket endpoint.
    pub async fn connect(&self) -> Result<GatewayConnection, SensorBusError> {
        let (ws_stream, _response) = connect_async(self.url.as_str()).await.map_err(|e| {
            SensorBusError::Connection(format!(
                "Failed to connect to sensor gateway at {}: {e}",
                self.url
            ))
        })?;

        tracing::info!(url = %self.url, "Connected to sensor gateway");

        Ok(GatewayConnection {
            url: self.url.clone(),
            ws_stream,
        })
    }
}
