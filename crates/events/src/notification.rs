//! Typed outbound events and their wire envelope.

use serde::{Deserialize, Serialize};
use serde_json::json;
use soilsense_core::job_events::*;
use soilsense_core::sensor::SensorReading;
use soilsense_core::state_machine::JobStatus;
use soilsense_core::types::{JobId, ObserverId, Timestamp};
use soilsense_store::{ChatRole, JobSnapshot};

// ---------------------------------------------------------------------------
// ServerEvent
// ---------------------------------------------------------------------------

/// Every event kind pushed to real-time observers.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Sent to the requester once the job exists and the request is out.
    MeasurementStarted { status: JobStatus },
    MeasurementFailed { reason: String },
    SensorDone(SensorReading),
    AnalysisInProgress,
    /// Diagnosis exactly as returned by the analysis service.
    AnalysisDone(serde_json::Value),
    AnalysisFailed { reason: String },
    JobStatus(JobSnapshot),
    ChatReply { role: ChatRole, text: String },
    ChatFailed { reason: String },
    Error { reason: String },
}

impl ServerEvent {
    /// The `action` string of the envelope.
    pub fn action(&self) -> &'static str {
        match self {
            ServerEvent::MeasurementStarted { .. } => ACTION_MEASUREMENT_STARTED,
            ServerEvent::MeasurementFailed { .. } => ACTION_MEASUREMENT_FAILED,
            ServerEvent::SensorDone(_) => ACTION_SENSOR_DONE,
            ServerEvent::AnalysisInProgress => ACTION_ANALYSIS_IN_PROGRESS,
            ServerEvent::AnalysisDone(_) => ACTION_ANALYSIS_DONE,
            ServerEvent::AnalysisFailed { .. } => ACTION_ANALYSIS_FAILED,
            ServerEvent::JobStatus(_) => ACTION_JOB_STATUS,
            ServerEvent::ChatReply { .. } => ACTION_CHAT_REPLY,
            ServerEvent::ChatFailed { .. } => ACTION_CHAT_FAILED,
            ServerEvent::Error { .. } => ACTION_ERROR,
        }
    }

    /// The `data` object of the envelope.
    pub fn data(&self) -> serde_json::Value {
        match self {
            ServerEvent::MeasurementStarted { status } => json!({ "status": status }),
            ServerEvent::AnalysisInProgress => {
                json!({ "status": JobStatus::AnalysisInProgress })
            }
            ServerEvent::SensorDone(reading) => json!(reading),
            ServerEvent::AnalysisDone(analysis) => analysis.clone(),
            ServerEvent::JobStatus(snapshot) => json!(snapshot),
            ServerEvent::ChatReply { role, text } => json!({ "role": role, "text": text }),
            ServerEvent::MeasurementFailed { reason }
            | ServerEvent::AnalysisFailed { reason }
            | ServerEvent::ChatFailed { reason }
            | ServerEvent::Error { reason } => json!({ "reason": reason }),
        }
    }

    /// Human-readable failure reason, for the failure variants.
    pub fn reason(&self) -> Option<&str> {
        match self {
            ServerEvent::MeasurementFailed { reason }
            | ServerEvent::AnalysisFailed { reason }
            | ServerEvent::ChatFailed { reason }
            | ServerEvent::Error { reason } => Some(reason),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire envelope
// ---------------------------------------------------------------------------

/// The `{action, jobID, data}` frame observers receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobUpdate {
    pub action: String,
    #[serde(rename = "jobID")]
    pub job_id: Option<JobId>,
    pub data: serde_json::Value,
}

impl JobUpdate {
    pub fn new(job_id: Option<JobId>, event: &ServerEvent) -> Self {
        Self {
            action: event.action().to_string(),
            job_id,
            data: event.data(),
        }
    }

    /// Serialize to the JSON text sent over the wire.
    pub fn to_json(&self) -> String {
        // A struct of String / Option<String> / Value always serializes.
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

// ---------------------------------------------------------------------------
// JobNotification
// ---------------------------------------------------------------------------

/// Who should receive a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Every member of the job's notification group.
    Job(JobId),
    /// A single observer (replies to commands).
    Observer(ObserverId),
    /// The job's group plus one observer that may not have joined it yet.
    /// Delivered at most once to that observer.
    JobAndObserver { job_id: JobId, observer: ObserverId },
}

/// A [`ServerEvent`] addressed to an [`Audience`].
///
/// Constructed via [`to_job`](JobNotification::to_job) or
/// [`to_observer`](JobNotification::to_observer) and optionally widened
/// with [`also_to`](JobNotification::also_to).
#[derive(Debug, Clone, PartialEq)]
pub struct JobNotification {
    pub audience: Audience,
    pub job_id: Option<JobId>,
    pub event: ServerEvent,
    pub timestamp: Timestamp,
}

impl JobNotification {
    /// Broadcast to the group of `job_id`.
    pub fn to_job(job_id: impl Into<JobId>, event: ServerEvent) -> Self {
        let job_id = job_id.into();
        Self {
            audience: Audience::Job(job_id.clone()),
            job_id: Some(job_id),
            event,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Reply to a single observer.
    pub fn to_observer(
        observer: impl Into<ObserverId>,
        job_id: Option<JobId>,
        event: ServerEvent,
    ) -> Self {
        Self {
            audience: Audience::Observer(observer.into()),
            job_id,
            event,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Additionally deliver a job broadcast to `observer`.
    ///
    /// Has no effect on notifications not addressed to a job group.
    pub fn also_to(mut self, observer: impl Into<ObserverId>) -> Self {
        if let Audience::Job(job_id) = &self.audience {
            self.audience = Audience::JobAndObserver {
                job_id: job_id.clone(),
                observer: observer.into(),
            };
        }
        self
    }

    /// Render the wire envelope.
    pub fn envelope(&self) -> JobUpdate {
        JobUpdate::new(self.job_id.clone(), &self.event)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn reading() -> SensorReading {
        SensorReading {
            n: 123.0,
            p: 47.5,
            k: 178.2,
            timestamp: "2025-06-05T10:15:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn sensor_done_envelope() {
        let update = JobUpdate::new(Some("job-1".into()), &ServerEvent::SensorDone(reading()));
        let json: serde_json::Value = serde_json::from_str(&update.to_json()).unwrap();

        assert_eq!(json["action"], "sensorDone");
        assert_eq!(json["jobID"], "job-1");
        assert_eq!(json["data"]["N"], 123.0);
        assert_eq!(json["data"]["P"], 47.5);
        assert_eq!(json["data"]["K"], 178.2);
        assert_eq!(json["data"]["timestamp"], "2025-06-05T10:15:00Z");
    }

    #[test]
    fn rejection_without_job_has_null_job_id() {
        let event = ServerEvent::MeasurementFailed {
            reason: "Missing treeID".into(),
        };
        let json = serde_json::to_value(JobUpdate::new(None, &event)).unwrap();

        assert_eq!(json["action"], "measurementFailed");
        assert!(json["jobID"].is_null());
        assert_eq!(json["data"], json!({ "reason": "Missing treeID" }));
        assert_eq!(event.reason(), Some("Missing treeID"));
    }

    #[test]
    fn analysis_done_forwards_payload_verbatim() {
        let diagnosis = json!({ "overall_diagnosis": { "priority": "medium" } });
        let update = JobUpdate::new(Some("j".into()), &ServerEvent::AnalysisDone(diagnosis.clone()));
        assert_eq!(update.data, diagnosis);
    }

    #[test]
    fn job_status_snapshot_fields() {
        let snapshot = JobSnapshot {
            status: JobStatus::Failed,
            sensor_data: Some(reading()),
            analysis: None,
            error: Some("timeout".into()),
        };
        let update = JobUpdate::new(Some("j".into()), &ServerEvent::JobStatus(snapshot));

        assert_eq!(update.action, "jobStatus");
        assert_eq!(update.data["status"], "failed");
        assert_eq!(update.data["error"], "timeout");
        assert!(update.data["analysis"].is_null());
        assert_eq!(update.data["sensorData"]["K"], 178.2);
    }

    #[test]
    fn chat_reply_shape() {
        let event = ServerEvent::ChatReply {
            role: ChatRole::Assistant,
            text: "Monitor next cycle.".into(),
        };
        assert_eq!(
            event.data(),
            json!({ "role": "assistant", "text": "Monitor next cycle." })
        );
        assert!(event.reason().is_none());
    }

    #[test]
    fn status_carrying_events() {
        let started = ServerEvent::MeasurementStarted {
            status: JobStatus::SensorInProgress,
        };
        assert_eq!(started.data(), json!({ "status": "sensorInProgress" }));
        assert_eq!(
            ServerEvent::AnalysisInProgress.data(),
            json!({ "status": "analysisInProgress" })
        );
    }

    #[test]
    fn also_to_widens_job_audience_only() {
        let widened = JobNotification::to_job("j", ServerEvent::AnalysisInProgress).also_to("c1");
        assert_eq!(
            widened.audience,
            Audience::JobAndObserver {
                job_id: "j".into(),
                observer: "c1".into()
            }
        );

        let direct = JobNotification::to_observer("c1", None, ServerEvent::AnalysisInProgress)
            .also_to("c2");
        assert_eq!(direct.audience, Audience::Observer("c1".into()));
    }

    #[test]
    fn envelope_round_trips() {
        let notification = JobNotification::to_job(
            "j",
            ServerEvent::ChatFailed {
                reason: "nope".into(),
            },
        );
        let text = notification.envelope().to_json();
        let parsed: JobUpdate = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, notification.envelope());
    }
}
