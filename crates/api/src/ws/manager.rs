use std::collections::{HashMap, HashSet};

use axum::body::Bytes;
use axum::extract::ws::Message;
use soilsense_core::types::{JobId, ObserverId, Timestamp};
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Metadata for a single WebSocket connection.
pub struct WsConnection {
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    /// When this connection was established.
    pub connected_at: Timestamp,
    /// Jobs this connection is subscribed to.
    pub jobs: HashSet<JobId>,
}

/// Manages all active WebSocket connections and their job groups.
///
/// A group is the set of connections subscribed to one job. Membership is
/// tracked on both sides so a disconnect can leave every group in one
/// step. Thread-safe via interior `RwLock`; designed to be wrapped in `Arc`
/// and shared across the application.
pub struct WsManager {
    connections: RwLock<HashMap<ObserverId, WsConnection>>,
    groups: RwLock<HashMap<JobId, HashSet<ObserverId>>>,
}

impl WsManager {
    /// Create a new, empty connection manager.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            groups: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink. Re-adding an existing id
    /// replaces the previous connection and drops its subscriptions.
    pub async fn add(&self, conn_id: impl Into<ObserverId>) -> mpsc::UnboundedReceiver<Message> {
        let conn_id = conn_id.into();
        self.remove(&conn_id).await;

        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            sender: tx,
            connected_at: chrono::Utc::now(),
            jobs: HashSet::new(),
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    /// Remove a connection and take it out of every group it joined.
    pub async fn remove(&self, conn_id: &str) {
        let Some(conn) = self.connections.write().await.remove(conn_id) else {
            return;
        };

        let mut groups = self.groups.write().await;
        for job_id in &conn.jobs {
            if let Some(members) = groups.get_mut(job_id) {
                members.remove(conn_id);
                if members.is_empty() {
                    groups.remove(job_id);
                }
            }
        }
        tracing::debug!(
            conn_id,
            groups_left = conn.jobs.len(),
            connected_secs = (chrono::Utc::now() - conn.connected_at).num_seconds(),
            "Connection removed",
        );
    }

    /// Add `conn_id` to the group of `job_id`. Idempotent.
    ///
    /// Returns `false` if the connection is unknown.
    pub async fn join(&self, conn_id: &str, job_id: &str) -> bool {
        {
            let mut conns = self.connections.write().await;
            let Some(conn) = conns.get_mut(conn_id) else {
                return false;
            };
            conn.jobs.insert(job_id.to_string());
        }
        self.groups
            .write()
            .await
            .entry(job_id.to_string())
            .or_default()
            .insert(conn_id.to_string());
        true
    }

    /// Remove `conn_id` from the group of `job_id`; no-op if absent.
    pub async fn leave(&self, conn_id: &str, job_id: &str) {
        if let Some(conn) = self.connections.write().await.get_mut(conn_id) {
            conn.jobs.remove(job_id);
        }
        let mut groups = self.groups.write().await;
        if let Some(members) = groups.get_mut(job_id) {
            members.remove(conn_id);
            if members.is_empty() {
                groups.remove(job_id);
            }
        }
    }

    /// Send a message to one connection.
    ///
    /// Returns `false` if the connection is unknown or its channel is closed.
    pub async fn send_to(&self, conn_id: &str, message: Message) -> bool {
        match self.connections.read().await.get(conn_id) {
            Some(conn) => conn.sender.send(message).is_ok(),
            None => false,
        }
    }

    /// Send a message to every member of the group of `job_id`.
    ///
    /// Returns the number of connections the message was sent to; an empty
    /// or unknown group yields zero.
    pub async fn broadcast_to_group(&self, job_id: &str, message: Message) -> usize {
        self.send_to_group_and(job_id, None, message).await
    }

    /// Like [`broadcast_to_group`](Self::broadcast_to_group), additionally
    /// reaching `extra` exactly once whether or not it is a member.
    pub async fn send_to_group_and(
        &self,
        job_id: &str,
        extra: Option<&str>,
        message: Message,
    ) -> usize {
        let mut targets: HashSet<ObserverId> = self
            .groups
            .read()
            .await
            .get(job_id)
            .cloned()
            .unwrap_or_default();
        if let Some(extra) = extra {
            targets.insert(extra.to_string());
        }

        let conns = self.connections.read().await;
        let mut count = 0;
        for conn_id in &targets {
            if let Some(conn) = conns.get(conn_id) {
                if conn.sender.send(message.clone()).is_ok() {
                    count += 1;
                }
            }
        }
        count
    }

    /// Number of connections subscribed to `job_id`.
    pub async fn group_size(&self, job_id: &str) -> usize {
        self.groups
            .read()
            .await
            .get(job_id)
            .map_or(0, HashSet::len)
    }

    /// Number of jobs with at least one subscriber.
    pub async fn group_count(&self) -> usize {
        self.groups.read().await.len()
    }

    /// Whether `conn_id` is subscribed to `job_id`.
    pub async fn is_member(&self, conn_id: &str, job_id: &str) -> bool {
        self.groups
            .read()
            .await
            .get(job_id)
            .is_some_and(|members| members.contains(conn_id))
    }

    /// Return the current number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then clear all state.
    ///
    /// Used during graceful shutdown to notify all clients before the
    /// server stops.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        self.groups.write().await.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connected client.
    ///
    /// Used by the heartbeat task to keep connections alive and detect
    /// stale ones.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
