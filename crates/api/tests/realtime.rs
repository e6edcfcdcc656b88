//! End-to-end real-time channel tests over a live WebSocket.

mod common;

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use common::{build_test_app, TestApp};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve(app: &TestApp) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("ws://{addr}/api/v1/ws")
}

async fn connect(url: &str) -> Client {
    let (client, _) = connect_async(url).await.unwrap();
    client
}

async fn send(client: &mut Client, frame: Value) {
    client.send(Message::Text(frame.to_string())).await.unwrap();
}

/// Next JSON text frame, skipping pings.
async fn recv(client: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(3), client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Wait until the server has registered `n` connections.
async fn wait_for_connections(app: &TestApp, n: usize) {
    for _ in 0..100 {
        if app.state.ws_manager.connection_count().await == n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {n} connections");
}

fn reply(job_id: &str) -> Vec<u8> {
    json!({
        "jobID": job_id,
        "treeID": "T23",
        "timestamp": "2025-06-05T10:15:00Z",
        "N_ppm": 123.0,
        "P_ppm": 47.5,
        "K_ppm": 178.2,
    })
    .to_string()
    .into_bytes()
}

#[tokio::test]
async fn measurement_flows_to_subscriber() {
    let app = build_test_app();
    let url = serve(&app).await;
    let mut client = connect(&url).await;
    let mut published = app.bus.watch_published();

    send(&mut client, json!({"type": "command", "action": "startMeasurement", "treeID": "T23"})).await;

    let started = recv(&mut client).await;
    assert_eq!(started["action"], "measurementStarted");
    assert_eq!(started["data"]["status"], "sensorInProgress");
    let job_id = started["jobID"].as_str().unwrap().to_string();

    send(&mut client, json!({"type": "subscribe", "jobID": job_id})).await;
    let snapshot = recv(&mut client).await;
    assert_eq!(snapshot["action"], "jobStatus");
    assert_eq!(snapshot["data"]["status"], "sensorInProgress");
    assert!(snapshot["data"]["sensorData"].is_null());

    let request = tokio::time::timeout(Duration::from_secs(2), published.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(request.topic, format!("npk/read/request/T23/{job_id}"));

    app.bus.inject(&format!("npk/read/response/{job_id}"), reply(&job_id));

    let sensor_done = recv(&mut client).await;
    assert_eq!(sensor_done["action"], "sensorDone");
    assert_eq!(sensor_done["jobID"], job_id.as_str());
    assert_eq!(sensor_done["data"]["N"], 123.0);
    assert_eq!(sensor_done["data"]["K"], 178.2);

    assert_eq!(recv(&mut client).await["action"], "analysisInProgress");

    let done = recv(&mut client).await;
    assert_eq!(done["action"], "analysisDone");
    assert_eq!(done["data"]["treeID"], "T23");

    send(&mut client, json!({"type": "command", "action": "chat", "jobID": job_id, "message": "Why is K low?"})).await;
    let chat = recv(&mut client).await;
    assert_eq!(chat["action"], "chatReply");
    assert_eq!(chat["data"]["role"], "assistant");
    assert!(chat["data"]["text"].as_str().unwrap().contains("K is 180 ppm"));
}

#[tokio::test]
async fn late_subscriber_gets_current_snapshot() {
    let app = build_test_app();
    let url = serve(&app).await;
    let mut starter = connect(&url).await;

    send(&mut starter, json!({"type": "command", "action": "startMeasurement", "treeID": "T23"})).await;
    let job_id = recv(&mut starter).await["jobID"].as_str().unwrap().to_string();
    send(&mut starter, json!({"type": "subscribe", "jobID": job_id})).await;
    recv(&mut starter).await;

    app.bus.inject(&format!("npk/read/response/{job_id}"), reply(&job_id));
    for action in ["sensorDone", "analysisInProgress", "analysisDone"] {
        assert_eq!(recv(&mut starter).await["action"], action);
    }

    let mut late = connect(&url).await;
    send(&mut late, json!({"type": "subscribe", "jobID": job_id})).await;
    let snapshot = recv(&mut late).await;
    assert_eq!(snapshot["action"], "jobStatus");
    assert_eq!(snapshot["data"]["status"], "analysisDone");
    assert_eq!(snapshot["data"]["sensorData"]["P"], 47.5);
    assert!(snapshot["data"]["analysis"].is_object());
    assert!(snapshot["data"]["error"].is_null());
}

#[tokio::test]
async fn subscribe_to_unknown_job_sends_nothing_until_update() {
    let app = build_test_app();
    let url = serve(&app).await;
    let mut client = connect(&url).await;
    wait_for_connections(&app, 1).await;

    send(&mut client, json!({"type": "subscribe", "jobID": "not-yet"})).await;
    send(&mut client, json!({"type": "command", "action": "dance"})).await;

    let first = recv(&mut client).await;
    assert_eq!(first["action"], "error");
    assert_eq!(first["data"]["reason"], "Unknown action: dance");
    assert_eq!(app.state.ws_manager.group_size("not-yet").await, 1);
}

#[tokio::test]
async fn invalid_frame_gets_error_reply() {
    let app = build_test_app();
    let url = serve(&app).await;
    let mut client = connect(&url).await;

    client.send(Message::Text("not json".into())).await.unwrap();

    let error = recv(&mut client).await;
    assert_eq!(error["action"], "error");
    assert!(error["jobID"].is_null());
    assert!(error["data"]["reason"].as_str().unwrap().starts_with("Invalid message"));
}

#[tokio::test]
async fn disconnect_leaves_all_groups() {
    let app = build_test_app();
    let url = serve(&app).await;
    let mut client = connect(&url).await;
    wait_for_connections(&app, 1).await;

    send(&mut client, json!({"type": "subscribe", "jobID": "job-a"})).await;
    send(&mut client, json!({"type": "subscribe", "jobID": "job-b"})).await;
    send(&mut client, json!({"type": "command", "action": "noop"})).await;
    recv(&mut client).await;
    assert_eq!(app.state.ws_manager.group_count().await, 2);

    client.close(None).await.unwrap();
    wait_for_connections(&app, 0).await;

    assert_eq!(app.state.ws_manager.group_size("job-a").await, 0);
    assert_eq!(app.state.ws_manager.group_count().await, 0);
}
