//! Follow-up questions on a finished diagnosis.
//!
//! Chat never changes the job status; it only appends to the history.

use std::sync::Arc;

use soilsense_analysis::{AnalysisError, ChatAnswer};
use soilsense_core::state_machine::JobStatus;
use soilsense_core::types::{JobId, ObserverId};
use soilsense_events::{JobNotification, ServerEvent};
use soilsense_store::{ChatMessage, ChatRole, Job};

use crate::event::PipelineEvent;
use crate::orchestrator::Orchestrator;

pub const REASON_MISSING_CHAT_FIELDS: &str = "Missing jobID or message";

pub fn not_ready_reason(job_id: &str) -> String {
    format!("Job {job_id} not found or not ready for chat")
}

/// Tree and diagnosis of a job that can take follow-ups.
fn chat_context(job: Job) -> Option<(String, serde_json::Value)> {
    if job.status != JobStatus::AnalysisDone {
        return None;
    }
    job.analysis.map(|analysis| (job.tree_id, analysis))
}

impl Orchestrator {
    pub(crate) async fn start_chat(
        &mut self,
        observer: ObserverId,
        job_id: Option<JobId>,
        message: Option<String>,
    ) {
        let (Some(job_id), Some(message)) = (job_id.clone(), message) else {
            self.notify(JobNotification::to_observer(
                observer,
                job_id,
                ServerEvent::ChatFailed {
                    reason: REASON_MISSING_CHAT_FIELDS.into(),
                },
            ));
            return;
        };

        let Some((tree_id, diagnosis)) = self.jobs.get(&job_id).await.and_then(chat_context)
        else {
            tracing::debug!(job_id = %job_id, "Chat rejected: job not ready");
            self.notify(JobNotification::to_observer(
                observer,
                Some(job_id.clone()),
                ServerEvent::ChatFailed {
                    reason: not_ready_reason(&job_id),
                },
            ));
            return;
        };

        let analysis = Arc::clone(&self.analysis);
        let tx = self.tx.clone();
        tracing::info!(job_id = %job_id, observer = %observer, "Chat follow-up requested");

        tokio::spawn(async move {
            let result = analysis.chat(&tree_id, &diagnosis, &message).await;
            let event = PipelineEvent::ChatCompleted {
                observer,
                job_id,
                message,
                result,
            };
            if tx.send(event).await.is_err() {
                tracing::warn!("Orchestrator stopped before chat completed");
            }
        });
    }

    pub(crate) async fn on_chat_completed(
        &mut self,
        observer: ObserverId,
        job_id: JobId,
        message: String,
        result: Result<ChatAnswer, AnalysisError>,
    ) {
        let answer = match result {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Chat failed");
                self.notify(JobNotification::to_observer(
                    observer,
                    Some(job_id),
                    ServerEvent::ChatFailed {
                        reason: e.to_string(),
                    },
                ));
                return;
            }
        };

        let appended = self
            .jobs
            .append_chat(
                &job_id,
                [
                    ChatMessage::new(ChatRole::User, message),
                    ChatMessage::new(ChatRole::Assistant, answer.text.clone()),
                ],
            )
            .await;
        if appended.is_none() {
            tracing::warn!(job_id = %job_id, "Chat answer for unknown job dropped");
            return;
        }

        self.notify(JobNotification::to_job(
            job_id,
            ServerEvent::ChatReply {
                role: ChatRole::Assistant,
                text: answer.text,
            },
        ));
    }
}
