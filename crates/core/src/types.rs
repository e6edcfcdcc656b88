/// Opaque job identifier (UUID v4 rendered as a string).
///
/// Used verbatim as the correlation key on the sensor bus and as the
/// notification group name.
pub type JobId = String;

/// Identifier of a single real-time observer connection.
pub type ObserverId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Allocate a fresh job identifier.
pub fn new_job_id() -> JobId {
    uuid::Uuid::new_v4().to_string()
}
