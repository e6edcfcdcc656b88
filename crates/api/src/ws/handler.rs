use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use soilsense_core::types::JobId;
use soilsense_events::{JobUpdate, ServerEvent};

use crate::state::AppState;
use crate::ws::messages::ClientMessage;

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the connection is registered with `WsManager` and
/// managed by two tasks (sender + receiver).
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with `WsManager`.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Processes inbound frames on the current task.
///   4. On disconnect, removes the connection from every job group.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "WebSocket connected");

    let mut rx = state.ws_manager.add(conn_id.clone()).await;

    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => handle_text(&state, &conn_id, text.as_str()).await,
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    state.ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}

/// Dispatch one inbound text frame.
async fn handle_text(state: &AppState, conn_id: &str, text: &str) {
    let message = match ClientMessage::parse(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(conn_id, error = %e, "Invalid WebSocket frame");
            reply(
                state,
                conn_id,
                None,
                ServerEvent::Error {
                    reason: format!("Invalid message: {e}"),
                },
            )
            .await;
            return;
        }
    };

    match message {
        ClientMessage::Subscribe { job_id } => subscribe(state, conn_id, job_id).await,
        ClientMessage::Unsubscribe { job_id } => {
            tracing::debug!(conn_id, job_id = %job_id, "Unsubscribing from job");
            state.ws_manager.leave(conn_id, &job_id).await;
        }
        ClientMessage::Command(request) => {
            let job_id = request.job_id.clone();
            if let Err(e) = state.orchestrator.command(conn_id, request).await {
                tracing::error!(conn_id, error = %e, "Command not delivered");
                reply(
                    state,
                    conn_id,
                    job_id,
                    ServerEvent::Error {
                        reason: e.to_string(),
                    },
                )
                .await;
            }
        }
    }
}

/// Join the job's group, then have the orchestrator send the current
/// snapshot if the job exists.
async fn subscribe(state: &AppState, conn_id: &str, job_id: JobId) {
    tracing::debug!(conn_id, job_id = %job_id, "Subscribing to job");
    state.ws_manager.join(conn_id, &job_id).await;

    if let Err(e) = state.orchestrator.subscribe(conn_id, job_id.clone()).await {
        tracing::error!(conn_id, error = %e, "Snapshot request not delivered");
        reply(
            state,
            conn_id,
            Some(job_id),
            ServerEvent::Error {
                reason: e.to_string(),
            },
        )
        .await;
    }
}

async fn reply(state: &AppState, conn_id: &str, job_id: Option<JobId>, event: ServerEvent) {
    let text = JobUpdate::new(job_id, &event).to_json();
    state
        .ws_manager
        .send_to(conn_id, Message::Text(text.into()))
        .await;
}
