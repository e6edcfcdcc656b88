//! Analysis dispatch and completion.

use std::sync::Arc;

use soilsense_analysis::AnalysisError;
use soilsense_core::state_machine::JobEvent;
use soilsense_core::types::JobId;
use soilsense_events::{JobNotification, ServerEvent};
use soilsense_store::{Job, JobPatch};

use crate::event::PipelineEvent;
use crate::orchestrator::Orchestrator;

impl Orchestrator {
    /// Hand `job` to the analysis capability on a separate task.
    ///
    /// At most one call is outstanding per job; a second dispatch for a job
    /// already in flight is dropped. There is no retry.
    pub(crate) fn dispatch_analysis(&mut self, job: Job) {
        let Some(reading) = job.sensor_data.clone() else {
            tracing::error!(job_id = %job.job_id, "Analysis requested without sensor data");
            return;
        };
        if !self.in_flight.insert(job.job_id.clone()) {
            tracing::warn!(job_id = %job.job_id, "Analysis already in flight");
            return;
        }

        let analysis = Arc::clone(&self.analysis);
        let tx = self.tx.clone();
        tracing::info!(job_id = %job.job_id, tree_id = %job.tree_id, "Dispatching analysis");

        tokio::spawn(async move {
            let result = analysis.analyze(&job.tree_id, &reading).await;
            let event = PipelineEvent::AnalysisCompleted {
                job_id: job.job_id,
                result,
            };
            if tx.send(event).await.is_err() {
                tracing::warn!("Orchestrator stopped before analysis completed");
            }
        });
    }

    pub(crate) async fn on_analysis_completed(
        &mut self,
        job_id: JobId,
        result: Result<serde_json::Value, AnalysisError>,
    ) {
        self.in_flight.remove(&job_id);

        let Some(job) = self.jobs.get(&job_id).await else {
            tracing::warn!(job_id = %job_id, "Analysis completed for unknown job");
            return;
        };

        let (event, patch, notification) = match result {
            Ok(diagnosis) => (
                JobEvent::AnalysisSucceeded,
                JobPatch::default().with_analysis(diagnosis.clone()),
                ServerEvent::AnalysisDone(diagnosis),
            ),
            Err(e) => {
                let reason = e.to_string();
                tracing::error!(job_id = %job_id, error = %reason, "Analysis failed");
                (
                    JobEvent::AnalysisFailed,
                    JobPatch::default().with_error(reason.clone()),
                    ServerEvent::AnalysisFailed { reason },
                )
            }
        };

        match self.advance(&job, event, patch).await {
            Ok(_) => self.notify(JobNotification::to_job(job_id, notification)),
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Analysis result discarded");
            }
        }
    }
}
