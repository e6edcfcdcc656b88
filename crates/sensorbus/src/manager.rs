//! Persistent sensor gateway connection.
//!
//! [`GatewayManager`] owns one long-lived connection task (connect ->
//! subscribe -> process -> reconnect) and implements [`SensorBus`] on top
//! of it. Inbound messages are broadcast via a
//! [`tokio::sync::broadcast`] channel; publishing hands frames to the
//! live session and waits until the session has written them, failing
//! fast while the gateway is unreachable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot, Mutex, RwLock};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::bus::{BusMessage, SensorBus, SensorBusError};
use crate::client::{GatewayClient, GatewayConnection};
use crate::messages::GatewayFrame;
use crate::processor::{process_frame, FrameOutcome};
use crate::reconnect::{reconnect_loop, ReconnectConfig};

/// Broadcast channel capacity for inbound messages.
const INBOUND_CHANNEL_CAPACITY: usize = 256;

/// A frame queued for the live session, with the channel that reports
/// whether it reached the socket.
struct Outbound {
    message: Message,
    ack: oneshot::Sender<Result<(), SensorBusError>>,
}

/// State shared between the manager handle and its connection task.
struct Shared {
    /// Sender feeding the live session's sink; `None` while disconnected.
    outbound: RwLock<Option<mpsc::UnboundedSender<Outbound>>>,
    connected: AtomicBool,
    inbound_tx: broadcast::Sender<BusMessage>,
}

/// Manages the connection to a sensor gateway.
///
/// Created once at application startup via [`GatewayManager::start`].
pub struct GatewayManager {
    shared: Arc<Shared>,
    /// Master cancellation token, cancelled during shutdown.
    cancel: CancellationToken,
    task_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl GatewayManager {
    /// Spawn the connection task for `url`, subscribing to `filters` on
    /// every (re)connect.
    pub fn start(url: impl Into<String>, filters: Vec<String>) -> Arc<Self> {
        Self::start_with(url, filters, ReconnectConfig::default())
    }

    /// Like [`start`](Self::start) with a custom backoff.
    pub fn start_with(
        url: impl Into<String>,
        filters: Vec<String>,
        reconnect: ReconnectConfig,
    ) -> Arc<Self> {
        let (inbound_tx, _) = broadcast::channel(INBOUND_CHANNEL_CAPACITY);
        let shared = Arc::new(Shared {
            outbound: RwLock::new(None),
            connected: AtomicBool::new(false),
            inbound_tx,
        });
        let cancel = CancellationToken::new();
        let client = GatewayClient::new(url);

        let task_shared = Arc::clone(&shared);
        let task_cancel = cancel.clone();
        let task_handle = tokio::spawn(async move {
            tracing::info!(url = client.url(), "Starting sensor gateway connection task");
            run_connection_loop(&client, &filters, &reconnect, &task_shared, &task_cancel).await;
            tracing::info!(url = client.url(), "Sensor gateway connection task exited");
        });

        Arc::new(Self {
            shared,
            cancel,
            task_handle: Mutex::new(Some(task_handle)),
        })
    }

    /// Stop the connection task, waiting up to 5 seconds for a clean exit.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down sensor gateway manager");
        self.cancel.cancel();
        if let Some(handle) = self.task_handle.lock().await.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }
    }
}

#[async_trait]
impl SensorBus for GatewayManager {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), SensorBusError> {
        let payload = String::from_utf8(payload)
            .map_err(|e| SensorBusError::Protocol(format!("payload is not UTF-8: {e}")))?;
        let text = GatewayFrame::publish(topic, payload).encode()?;

        // Clone the sender so the lock is not held while waiting for the ack.
        let sender = self
            .shared
            .outbound
            .read()
            .await
            .clone()
            .ok_or(SensorBusError::NotConnected)?;

        let (ack, written) = oneshot::channel();
        sender
            .send(Outbound {
                message: Message::Text(text),
                ack,
            })
            .map_err(|_| SensorBusError::NotConnected)?;

        // A dropped ack means the session ended before writing the frame.
        written.await.map_err(|_| SensorBusError::NotConnected)??;

        tracing::debug!(topic, "Published to sensor gateway");
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.shared.inbound_tx.subscribe()
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }
}

/// Core connection loop: connect -> session -> reconnect.
///
/// Runs until the cancellation token is triggered.
async fn run_connection_loop(
    client: &GatewayClient,
    filters: &[String],
    reconnect: &ReconnectConfig,
    shared: &Shared,
    cancel: &CancellationToken,
) {
    let mut conn = match client.connect().await {
        Ok(conn) => Some(conn),
        Err(e) => {
            tracing::warn!(error = %e, "Connection failed, entering reconnect loop");
            None
        }
    };

    loop {
        let live = match conn.take() {
            Some(live) => live,
            None => match reconnect_loop(client, reconnect, cancel).await {
                Some(live) => live,
                None => return, // cancelled
            },
        };

        run_session(live, filters, shared, cancel).await;

        if cancel.is_cancelled() {
            return;
        }
        tracing::warn!(url = client.url(), "Sensor gateway connection lost");
    }
}

/// Drive one connected session until it drops or is cancelled.
async fn run_session(
    conn: GatewayConnection,
    filters: &[String],
    shared: &Shared,
    cancel: &CancellationToken,
) {
    let (mut sink, mut stream) = conn.ws_stream.split();

    for filter in filters {
        let text = match GatewayFrame::subscribe(filter.as_str()).encode() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode subscribe frame");
                return;
            }
        };
        if let Err(e) = sink.send(Message::Text(text)).await {
            tracing::error!(topic = %filter, error = %e, "Failed to subscribe on sensor gateway");
            return;
        }
        tracing::info!(topic = %filter, "Subscribed on sensor gateway");
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    *shared.outbound.write().await = Some(tx);
    shared.connected.store(true, Ordering::SeqCst);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            outbound = rx.recv() => match outbound {
                Some(Outbound { message, ack }) => match sink.send(message).await {
                    Ok(()) => {
                        let _ = ack.send(Ok(()));
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Sensor gateway send error");
                        let _ = ack.send(Err(SensorBusError::Protocol(format!(
                            "send failed: {e}"
                        ))));
                        break;
                    }
                },
                None => break,
            },
            inbound = stream.next() => match inbound {
                Some(frame) => {
                    if process_frame(frame, &shared.inbound_tx) == FrameOutcome::Closed {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    shared.connected.store(false, Ordering::SeqCst);
    *shared.outbound.write().await = None;
    fail_pending(&mut rx);
}

/// Reject every frame still queued for a session that has ended.
fn fail_pending(rx: &mut mpsc::UnboundedReceiver<Outbound>) {
    rx.close();
    let mut dropped = 0usize;
    while let Ok(Outbound { ack, .. }) = rx.try_recv() {
        let _ = ack.send(Err(SensorBusError::NotConnected));
        dropped += 1;
    }
    if dropped > 0 {
        tracing::warn!(dropped, "Sensor gateway session ended with unsent frames");
    }
}
