//! Construction of the sensor bus and analysis backends from config.

use std::sync::Arc;

use soilsense_analysis::{AnalysisError, AnalysisService, GeminiClient, StubAnalysis};
use soilsense_core::topics::response_filter;
use soilsense_sensorbus::memory::run_simulated_device;
use soilsense_sensorbus::{GatewayManager, MemorySensorBus, SensorBus};
use tokio_util::sync::CancellationToken;

use crate::config::{AnalysisProvider, SensorConfig};

/// The running sensor bus plus whatever needs stopping at shutdown.
pub struct SensorBusService {
    pub bus: Arc<dyn SensorBus>,
    /// Set when connected through a gateway.
    pub gateway: Option<Arc<GatewayManager>>,
}

impl SensorBusService {
    /// Connect to the configured gateway, or fall back to the in-memory
    /// bus (with the simulated device when enabled).
    pub fn start(config: &SensorConfig, cancel: &CancellationToken) -> Self {
        let filters = vec![response_filter(&config.namespace)];

        match &config.gateway_url {
            Some(url) => {
                tracing::info!(url = %url, namespace = %config.namespace, "Using sensor gateway");
                let gateway = GatewayManager::start(url.clone(), filters);
                Self {
                    bus: gateway.clone(),
                    gateway: Some(gateway),
                }
            }
            None => {
                tracing::warn!(
                    namespace = %config.namespace,
                    simulator = config.simulator,
                    "SENSOR_GATEWAY_URL not set, using in-memory sensor bus",
                );
                let bus = Arc::new(MemorySensorBus::with_filters(filters));
                if config.simulator {
                    tokio::spawn(run_simulated_device(
                        Arc::clone(&bus),
                        config.namespace.clone(),
                        config.simulator_delay,
                        cancel.child_token(),
                    ));
                }
                Self { bus, gateway: None }
            }
        }
    }

    pub async fn shutdown(&self) {
        if let Some(gateway) = &self.gateway {
            gateway.shutdown().await;
        }
    }
}

/// Build the analysis backend selected by `provider`.
pub fn build_analysis(
    provider: &AnalysisProvider,
) -> Result<Arc<dyn AnalysisService>, AnalysisError> {
    match provider {
        AnalysisProvider::Stub => {
            tracing::info!("Using stub analysis provider");
            Ok(Arc::new(StubAnalysis::default()))
        }
        AnalysisProvider::Gemini(config) => {
            tracing::info!(model = %config.model, url = %config.api_url, "Using Gemini analysis provider");
            Ok(Arc::new(GeminiClient::new(config.clone())?))
        }
    }
}
