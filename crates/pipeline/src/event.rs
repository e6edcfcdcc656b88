use soilsense_analysis::{AnalysisError, ChatAnswer};
use soilsense_core::types::{JobId, ObserverId};

use crate::command::Command;

/// Everything the orchestrator loop reacts to.
#[derive(Debug)]
pub enum PipelineEvent {
    /// A command from a real-time observer.
    Command {
        observer: ObserverId,
        command: Command,
    },

    /// `observer` joined the group of `job_id` and wants its current state.
    Subscribe { observer: ObserverId, job_id: JobId },

    /// A raw message received from the sensor bus.
    SensorMessage { topic: String, payload: Vec<u8> },

    /// The analysis call for `job_id` finished.
    AnalysisCompleted {
        job_id: JobId,
        result: Result<serde_json::Value, AnalysisError>,
    },

    /// A chat follow-up for `job_id` finished.
    ChatCompleted {
        observer: ObserverId,
        job_id: JobId,
        message: String,
        result: Result<ChatAnswer, AnalysisError>,
    },

    /// An outside collaborator reports that `job_id` cannot proceed.
    ExternalError { job_id: JobId, reason: String },
}

impl PipelineEvent {
    /// Short name for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineEvent::Command { .. } => "command",
            PipelineEvent::Subscribe { .. } => "subscribe",
            PipelineEvent::SensorMessage { .. } => "sensor_message",
            PipelineEvent::AnalysisCompleted { .. } => "analysis_completed",
            PipelineEvent::ChatCompleted { .. } => "chat_completed",
            PipelineEvent::ExternalError { .. } => "external_error",
        }
    }
}
