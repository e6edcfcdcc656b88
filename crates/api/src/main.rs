use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use soilsense_api::config::{LogFormat, ServerConfig};
use soilsense_api::notifications::NotificationRouter;
use soilsense_api::router::build_app_router;
use soilsense_api::services::{build_analysis, SensorBusService};
use soilsense_api::state::AppState;
use soilsense_api::ws;
use soilsense_events::EventBus;
use soilsense_pipeline::Orchestrator;
use soilsense_store::JobTable;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(LogFormat::Pretty);
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    // --- Tracing ---
    init_tracing(config.log_format);
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let cancel = CancellationToken::new();

    // --- Sensor bus ---
    let sensor = SensorBusService::start(&config.sensor, &cancel);

    // --- Analysis ---
    let analysis = match build_analysis(&config.analysis) {
        Ok(analysis) => analysis,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build analysis client");
            std::process::exit(1);
        }
    };

    // --- Job table, event bus, WebSocket manager ---
    let jobs = Arc::new(JobTable::new());
    let event_bus = Arc::new(EventBus::default());
    let ws_manager = Arc::new(ws::WsManager::new());
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager));

    // Spawn notification router (delivers job updates to WebSocket groups).
    let notification_router = NotificationRouter::new(Arc::clone(&ws_manager));
    let router_handle = tokio::spawn(notification_router.run(event_bus.subscribe(), cancel.clone()));

    // --- Orchestrator ---
    let (orchestrator, orchestrator_handle) = Orchestrator::new(
        Arc::clone(&jobs),
        Arc::clone(&sensor.bus),
        analysis,
        Arc::clone(&event_bus),
        config.sensor.namespace.clone(),
    );
    let orchestrator_task = tokio::spawn(orchestrator.run(cancel.clone()));
    tracing::info!("Orchestrator and notification router started");

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        jobs,
        ws_manager: Arc::clone(&ws_manager),
        sensor_bus: Arc::clone(&sensor.bus),
        orchestrator: orchestrator_handle,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let grace = Duration::from_secs(config.shutdown_timeout_secs);

    cancel.cancel();
    let _ = tokio::time::timeout(grace, orchestrator_task).await;
    let _ = tokio::time::timeout(grace, router_handle).await;
    tracing::info!("Orchestrator and notification router stopped");

    sensor.shutdown().await;

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    heartbeat_handle.abort();
    tracing::info!("Graceful shutdown complete");
}

/// Install the global subscriber, pretty or JSON.
fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "soilsense_api=debug,soilsense_pipeline=debug,soilsense_sensorbus=info,tower_http=debug"
            .into()
    });
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
