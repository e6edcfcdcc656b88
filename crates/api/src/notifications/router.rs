//! Event-to-connection routing.
//!
//! [`NotificationRouter`] subscribes to the [`EventBus`](soilsense_events::EventBus)
//! and delivers each [`JobNotification`] to the connections its audience
//! names.

use std::sync::Arc;

use axum::extract::ws::Message;
use soilsense_events::{Audience, JobNotification};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::ws::WsManager;

/// Routes job notifications to WebSocket connections.
pub struct NotificationRouter {
    ws_manager: Arc<WsManager>,
}

impl NotificationRouter {
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Run the routing loop.
    ///
    /// Exits when `cancel` fires or the channel is closed (i.e. the
    /// event bus is dropped).
    pub async fn run(
        self,
        mut receiver: broadcast::Receiver<JobNotification>,
        cancel: CancellationToken,
    ) {
        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                received = receiver.recv() => received,
            };
            match received {
                Ok(notification) => {
                    self.route(&notification).await;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notification router lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, notification router shutting down");
                    break;
                }
            }
        }
    }

    /// Deliver one notification; returns how many connections received it.
    pub async fn route(&self, notification: &JobNotification) -> usize {
        let text = notification.envelope().to_json();
        let message = Message::Text(text.into());

        let delivered = match &notification.audience {
            Audience::Job(job_id) => self.ws_manager.broadcast_to_group(job_id, message).await,
            Audience::Observer(conn_id) => {
                usize::from(self.ws_manager.send_to(conn_id, message).await)
            }
            Audience::JobAndObserver { job_id, observer } => {
                self.ws_manager
                    .send_to_group_and(job_id, Some(observer), message)
                    .await
            }
        };

        tracing::debug!(
            action = notification.event.action(),
            job_id = ?notification.job_id,
            delivered,
            "Notification routed",
        );
        delivered
    }
}
