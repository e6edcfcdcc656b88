//! `startMeasurement`: create a job and send the sensor request.

use serde_json::json;
use soilsense_core::state_machine::JobEvent;
use soilsense_core::topics::request_topic;
use soilsense_core::types::ObserverId;
use soilsense_events::{JobNotification, ServerEvent};
use soilsense_store::JobPatch;

use crate::orchestrator::Orchestrator;

pub const REASON_MISSING_TREE_ID: &str = "Missing treeID";
/// Stored on the job when the request could not be published.
pub const ERROR_PUBLISH: &str = "Sensor bus publish error";
/// Sent to observers when the request could not be published.
pub const REASON_PUBLISH: &str = "Could not send sensor request to device";

impl Orchestrator {
    pub(crate) async fn start_measurement(&mut self, observer: ObserverId, tree_id: Option<String>) {
        let Some(tree_id) = tree_id else {
            tracing::warn!(observer = %observer, "startMeasurement without treeID");
            self.notify(JobNotification::to_observer(
                observer,
                None,
                ServerEvent::MeasurementFailed {
                    reason: REASON_MISSING_TREE_ID.into(),
                },
            ));
            return;
        };

        let job = self.jobs.create(tree_id).await;
        let job = match self
            .advance(&job, JobEvent::SensorRequested, JobPatch::default())
            .await
        {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(job_id = %job.job_id, error = %e, "Could not start measurement");
                return;
            }
        };
        tracing::info!(
            job_id = %job.job_id,
            tree_id = %job.tree_id,
            observer = %observer,
            "Measurement started",
        );

        self.notify(JobNotification::to_observer(
            observer.clone(),
            Some(job.job_id.clone()),
            ServerEvent::MeasurementStarted { status: job.status },
        ));

        let topic = request_topic(&self.namespace, &job.tree_id, &job.job_id);
        let payload = json!({ "timestamp": job.created_at }).to_string().into_bytes();

        match self.sensor_bus.publish(&topic, payload).await {
            Ok(()) => {
                tracing::info!(job_id = %job.job_id, topic = %topic, "Sensor request published");
            }
            Err(e) => {
                tracing::error!(
                    job_id = %job.job_id,
                    topic = %topic,
                    error = %e,
                    "Sensor request publish failed",
                );
                if let Err(e) = self
                    .advance(
                        &job,
                        JobEvent::PublishFailed,
                        JobPatch::default().with_error(ERROR_PUBLISH),
                    )
                    .await
                {
                    tracing::warn!(job_id = %job.job_id, error = %e, "Publish failure not recorded");
                    return;
                }
                self.notify(
                    JobNotification::to_job(
                        job.job_id.clone(),
                        ServerEvent::MeasurementFailed {
                            reason: REASON_PUBLISH.into(),
                        },
                    )
                    .also_to(observer),
                );
            }
        }
    }
}
