//! Action names carried by outbound job-update envelopes.
//!
//! Used by `soilsense-events` when rendering `{action, jobID, data}`
//! frames for real-time observers.

/// A measurement job was created and the sensor request is in flight.
pub const ACTION_MEASUREMENT_STARTED: &str = "measurementStarted";

/// A measurement could not be started or its request could not be sent.
pub const ACTION_MEASUREMENT_FAILED: &str = "measurementFailed";

/// The sensor reply arrived and was stored on the job.
pub const ACTION_SENSOR_DONE: &str = "sensorDone";

/// The reading was handed to the analysis service.
pub const ACTION_ANALYSIS_IN_PROGRESS: &str = "analysisInProgress";

/// The diagnosis is available.
pub const ACTION_ANALYSIS_DONE: &str = "analysisDone";

/// The analysis service failed; the job is terminal.
pub const ACTION_ANALYSIS_FAILED: &str = "analysisFailed";

/// Snapshot of a job sent to a freshly subscribed observer.
pub const ACTION_JOB_STATUS: &str = "jobStatus";

/// Follow-up answer for a finished job.
pub const ACTION_CHAT_REPLY: &str = "chatReply";

/// A chat follow-up was rejected or failed.
pub const ACTION_CHAT_FAILED: &str = "chatFailed";

/// Generic rejection (unknown action, malformed frame).
pub const ACTION_ERROR: &str = "error";
