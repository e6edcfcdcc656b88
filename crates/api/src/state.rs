use std::sync::Arc;

use soilsense_pipeline::OrchestratorHandle;
use soilsense_sensorbus::SensorBus;
use soilsense_store::JobTable;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Read-only from handlers; the orchestrator is the only writer.
    pub jobs: Arc<JobTable>,
    /// WebSocket connections and per-job notification groups.
    pub ws_manager: Arc<WsManager>,
    pub sensor_bus: Arc<dyn SensorBus>,
    /// Entry point for client commands.
    pub orchestrator: OrchestratorHandle,
}
