//! Correlation of sensor bus replies to the job that requested them.
//!
//! The job id is the last segment of a `<ns>/read/response/<jobID>` topic;
//! no pending-request table is kept.

use soilsense_core::sensor::SensorReply;
use soilsense_core::state_machine::{can_apply, valid_events, JobEvent};
use soilsense_core::topics::response_job_id;
use soilsense_events::{JobNotification, ServerEvent};
use soilsense_store::JobPatch;

use crate::orchestrator::Orchestrator;

impl Orchestrator {
    pub(crate) async fn on_sensor_message(&mut self, topic: &str, payload: &[u8]) {
        let Some(job_id) = response_job_id(&self.namespace, topic) else {
            tracing::warn!(topic, "Sensor message outside the reply topics");
            return;
        };

        let reply = match SensorReply::parse(payload) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(topic, job_id, error = %e, "Discarding malformed sensor payload");
                return;
            }
        };

        let Some(job) = self.jobs.get(job_id).await else {
            tracing::debug!(topic, job_id, "Sensor reply for unknown job ignored");
            return;
        };

        if let Some(echoed) = reply.job_id.as_deref() {
            if echoed != job.job_id {
                tracing::debug!(job_id, echoed, "Reply body names a different job; topic wins");
            }
        }

        if !can_apply(job.status, JobEvent::SensorReplyReceived) {
            tracing::warn!(
                job_id,
                status = %job.status,
                accepts = ?valid_events(job.status),
                "Discarding sensor reply: job is not waiting for one",
            );
            return;
        }

        let reading = reply.reading();
        let job = match self
            .advance(
                &job,
                JobEvent::SensorReplyReceived,
                JobPatch::default().with_sensor_data(reading.clone()),
            )
            .await
        {
            Ok(job) => job,
            Err(e) => {
                tracing::warn!(job_id, error = %e, "Sensor reply discarded");
                return;
            }
        };
        self.notify(JobNotification::to_job(
            job.job_id.clone(),
            ServerEvent::SensorDone(reading),
        ));

        let job = match self
            .advance(&job, JobEvent::AnalysisRequested, JobPatch::default())
            .await
        {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(job_id, error = %e, "Could not request analysis");
                return;
            }
        };
        self.notify(JobNotification::to_job(
            job.job_id.clone(),
            ServerEvent::AnalysisInProgress,
        ));

        self.dispatch_analysis(job);
    }
}
