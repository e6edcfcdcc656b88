use serde::{Deserialize, Serialize};
use soilsense_core::sensor::SensorReading;
use soilsense_core::state_machine::JobStatus;
use soilsense_core::types::{JobId, Timestamp};

/// One measurement-and-diagnosis workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(rename = "jobID")]
    pub job_id: JobId,
    #[serde(rename = "treeID")]
    pub tree_id: String,
    pub status: JobStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub sensor_data: Option<SensorReading>,
    /// Diagnosis returned by the analysis service, stored as-is.
    pub analysis: Option<serde_json::Value>,
    pub error: Option<String>,
    pub chat_history: Vec<ChatMessage>,
}

impl Job {
    /// The subset of fields sent to late subscribers.
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            status: self.status,
            sensor_data: self.sensor_data.clone(),
            analysis: self.analysis.clone(),
            error: self.error.clone(),
        }
    }
}

/// Current state of a job as seen by an observer joining late.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub status: JobStatus,
    pub sensor_data: Option<SensorReading>,
    pub analysis: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// Author of a chat follow-up message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One entry of a job's follow-up conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    pub timestamp: Timestamp,
}

impl ChatMessage {
    pub fn new(role: ChatRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Partial update merged into an existing [`Job`].
///
/// Only the fields set here are overwritten; everything else is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub sensor_data: Option<SensorReading>,
    pub analysis: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl JobPatch {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_sensor_data(mut self, reading: SensorReading) -> Self {
        self.sensor_data = Some(reading);
        self
    }

    pub fn with_analysis(mut self, analysis: serde_json::Value) -> Self {
        self.analysis = Some(analysis);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Shallow-merge this patch into `job`.
    pub(crate) fn apply(self, job: &mut Job) {
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(reading) = self.sensor_data {
            job.sensor_data = Some(reading);
        }
        if let Some(analysis) = self.analysis {
            job.analysis = Some(analysis);
        }
        if let Some(error) = self.error {
            job.error = Some(error);
        }
    }
}
