#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use soilsense_analysis::StubAnalysis;
use soilsense_api::config::{AnalysisProvider, LogFormat, SensorConfig, ServerConfig};
use soilsense_api::notifications::NotificationRouter;
use soilsense_api::router::build_app_router;
use soilsense_api::state::AppState;
use soilsense_api::ws::WsManager;
use soilsense_events::EventBus;
use soilsense_pipeline::Orchestrator;
use soilsense_sensorbus::MemorySensorBus;
use soilsense_store::JobTable;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and a 30-second request timeout.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        sensor: SensorConfig {
            gateway_url: None,
            namespace: "npk".to_string(),
            simulator: false,
            simulator_delay: Duration::ZERO,
        },
        analysis: AnalysisProvider::Stub,
        log_format: LogFormat::Pretty,
    }
}

/// A fully wired application backed by the in-memory sensor bus and a
/// zero-delay stub analysis.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub bus: Arc<MemorySensorBus>,
    cancel: CancellationToken,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Build the full application router with all middleware layers and the
/// background services `main.rs` starts.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let cancel = CancellationToken::new();

    let jobs = Arc::new(JobTable::new());
    let bus = Arc::new(MemorySensorBus::new());
    let event_bus = Arc::new(EventBus::default());
    let ws_manager = Arc::new(WsManager::new());

    tokio::spawn(
        NotificationRouter::new(Arc::clone(&ws_manager)).run(event_bus.subscribe(), cancel.clone()),
    );

    let (orchestrator, handle) = Orchestrator::new(
        Arc::clone(&jobs),
        bus.clone(),
        Arc::new(StubAnalysis::new(Duration::ZERO, Duration::ZERO)),
        event_bus,
        "npk",
    );
    tokio::spawn(orchestrator.run(cancel.clone()));

    let state = AppState {
        config: Arc::new(config.clone()),
        jobs,
        ws_manager,
        sensor_bus: bus.clone(),
        orchestrator: handle,
    };

    TestApp {
        router: build_app_router(state.clone(), &config),
        state,
        bus,
        cancel,
    }
}

/// Issue a GET request against the router.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
