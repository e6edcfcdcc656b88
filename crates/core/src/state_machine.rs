//! Job lifecycle state machine.
//!
//! Every status change of a job goes through [`transition`]; the store
//! itself never validates sequencing.
//!
//! ```text
//! pending ──sensorRequested──▶ sensorInProgress ──sensorReplyReceived──▶ sensorDone
//!                                    │                                      │
//!                              publishFailed                       analysisRequested
//!                                    ▼                                      ▼
//!                                 failed ◀──────analysisFailed────── analysisInProgress
//!                                                                           │
//!                                                                   analysisSucceeded
//!                                                                           ▼
//!                                                                      analysisDone
//! ```
//!
//! `externalError` moves any non-terminal status to `failed`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Statuses
// ---------------------------------------------------------------------------

/// Lifecycle status of a measurement-and-diagnosis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobStatus {
    Pending,
    SensorInProgress,
    SensorDone,
    AnalysisInProgress,
    AnalysisDone,
    Failed,
}

impl JobStatus {
    /// Wire name, identical to the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::SensorInProgress => "sensorInProgress",
            JobStatus::SensorDone => "sensorDone",
            JobStatus::AnalysisInProgress => "analysisInProgress",
            JobStatus::AnalysisDone => "analysisDone",
            JobStatus::Failed => "failed",
        }
    }

    /// `analysisDone` and `failed` accept no further pipeline events.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::AnalysisDone | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Inputs to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobEvent {
    SensorRequested,
    SensorReplyReceived,
    AnalysisRequested,
    AnalysisSucceeded,
    AnalysisFailed,
    PublishFailed,
    ExternalError,
}

impl JobEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            JobEvent::SensorRequested => "sensorRequested",
            JobEvent::SensorReplyReceived => "sensorReplyReceived",
            JobEvent::AnalysisRequested => "analysisRequested",
            JobEvent::AnalysisSucceeded => "analysisSucceeded",
            JobEvent::AnalysisFailed => "analysisFailed",
            JobEvent::PublishFailed => "publishFailed",
            JobEvent::ExternalError => "externalError",
        }
    }
}

impl fmt::Display for JobEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Transition table
// ---------------------------------------------------------------------------

/// Returns the events accepted while a job is in `from`.
///
/// Terminal statuses return an empty slice.
pub fn valid_events(from: JobStatus) -> &'static [JobEvent] {
    match from {
        JobStatus::Pending => &[JobEvent::SensorRequested, JobEvent::ExternalError],
        JobStatus::SensorInProgress => &[
            JobEvent::SensorReplyReceived,
            JobEvent::PublishFailed,
            JobEvent::ExternalError,
        ],
        JobStatus::SensorDone => &[JobEvent::AnalysisRequested, JobEvent::ExternalError],
        JobStatus::AnalysisInProgress => &[
            JobEvent::AnalysisSucceeded,
            JobEvent::AnalysisFailed,
            JobEvent::ExternalError,
        ],
        JobStatus::AnalysisDone | JobStatus::Failed => &[],
    }
}

/// Compute the status reached by applying `event` in status `from`.
///
/// Pure function; rejects with [`CoreError::InvalidTransition`] for any
/// event the table does not list for `from`.
pub fn transition(from: JobStatus, event: JobEvent) -> Result<JobStatus, CoreError> {
    let next = match (from, event) {
        (JobStatus::Pending, JobEvent::SensorRequested) => JobStatus::SensorInProgress,
        (JobStatus::SensorInProgress, JobEvent::SensorReplyReceived) => JobStatus::SensorDone,
        (JobStatus::SensorDone, JobEvent::AnalysisRequested) => JobStatus::AnalysisInProgress,
        (JobStatus::AnalysisInProgress, JobEvent::AnalysisSucceeded) => JobStatus::AnalysisDone,
        (JobStatus::AnalysisInProgress, JobEvent::AnalysisFailed) => JobStatus::Failed,
        (JobStatus::SensorInProgress, JobEvent::PublishFailed) => JobStatus::Failed,
        (status, JobEvent::ExternalError) if !status.is_terminal() => JobStatus::Failed,
        _ => return Err(CoreError::InvalidTransition { from, event }),
    };
    Ok(next)
}

/// Check whether `event` is accepted in status `from`.
pub fn can_apply(from: JobStatus, event: JobEvent) -> bool {
    transition(from, event).is_ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
