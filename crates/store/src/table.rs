use std::collections::HashMap;

use soilsense_core::state_machine::JobStatus;
use soilsense_core::types::{new_job_id, JobId};
use tokio::sync::RwLock;

use crate::models::{ChatMessage, Job, JobPatch};

/// Owns every job record.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared between the orchestrator (sole writer) and read-only HTTP and
/// WebSocket handlers.
pub struct JobTable {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl JobTable {
    /// Create a new, empty table.
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Allocate a fresh job for `tree_id` with status `pending`.
    pub async fn create(&self, tree_id: impl Into<String>) -> Job {
        let now = chrono::Utc::now();
        let job = Job {
            job_id: new_job_id(),
            tree_id: tree_id.into(),
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            sensor_data: None,
            analysis: None,
            error: None,
            chat_history: Vec::new(),
        };
        self.jobs
            .write()
            .await
            .insert(job.job_id.clone(), job.clone());
        tracing::debug!(job_id = %job.job_id, tree_id = %job.tree_id, "Job record created");
        job
    }

    /// Look up a job by id.
    pub async fn get(&self, job_id: &str) -> Option<Job> {
        self.jobs.read().await.get(job_id).cloned()
    }

    /// Merge `patch` into the job and refresh `updated_at`.
    ///
    /// Returns the updated record, or `None` if the id is unknown.
    pub async fn update(&self, job_id: &str, patch: JobPatch) -> Option<Job> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(job_id)?;
        patch.apply(job);
        job.updated_at = chrono::Utc::now();
        Some(job.clone())
    }

    /// Append follow-up messages to the job's chat history.
    pub async fn append_chat(
        &self,
        job_id: &str,
        messages: impl IntoIterator<Item = ChatMessage>,
    ) -> Option<Job> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(job_id)?;
        job.chat_history.extend(messages);
        job.updated_at = chrono::Utc::now();
        Some(job.clone())
    }

    /// Number of jobs held.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use soilsense_core::sensor::SensorReading;

    use super::*;
    use crate::models::ChatRole;

    fn reading() -> SensorReading {
        SensorReading {
            n: 123.0,
            p: 47.5,
            k: 178.2,
            timestamp: "2025-06-05T10:15:00Z".parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn create_seeds_pending_record() {
        let table = JobTable::new();
        let job = table.create("T23").await;

        assert_eq!(job.tree_id, "T23");
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.created_at, job.updated_at);
        assert!(job.sensor_data.is_none());
        assert!(job.analysis.is_none());
        assert!(job.error.is_none());
        assert!(job.chat_history.is_empty());
        assert_eq!(table.get(&job.job_id).await, Some(job));
    }

    #[tokio::test]
    async fn create_allocates_unique_ids() {
        let table = JobTable::new();
        let a = table.create("T1").await;
        let b = table.create("T1").await;

        assert_ne!(a.job_id, b.job_id);
        assert_eq!(table.len().await, 2);
    }

    #[tokio::test]
    async fn get_unknown_is_none() {
        let table = JobTable::new();
        assert!(table.get("missing").await.is_none());
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn update_is_shallow_merge() {
        let table = JobTable::new();
        let job = table.create("T23").await;

        table
            .update(
                &job.job_id,
                JobPatch::status(JobStatus::SensorDone).with_sensor_data(reading()),
            )
            .await
            .unwrap();

        let updated = table
            .update(&job.job_id, JobPatch::status(JobStatus::AnalysisInProgress))
            .await
            .unwrap();

        assert_eq!(updated.status, JobStatus::AnalysisInProgress);
        assert_eq!(updated.sensor_data, Some(reading()));
        assert_eq!(updated.tree_id, "T23");
        assert_eq!(updated.created_at, job.created_at);
        assert!(updated.updated_at >= job.updated_at);
    }

    #[tokio::test]
    async fn empty_patch_only_touches_updated_at() {
        let table = JobTable::new();
        let job = table.create("T23").await;

        let updated = table.update(&job.job_id, JobPatch::default()).await.unwrap();

        assert_eq!(updated.status, job.status);
        assert_eq!(updated.job_id, job.job_id);
        assert!(updated.updated_at >= job.updated_at);
    }

    #[tokio::test]
    async fn update_unknown_is_none() {
        let table = JobTable::new();
        let result = table
            .update("missing", JobPatch::status(JobStatus::Failed))
            .await;
        assert!(result.is_none());
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn append_chat_keeps_order() {
        let table = JobTable::new();
        let job = table.create("T23").await;

        table
            .append_chat(
                &job.job_id,
                [
                    ChatMessage::new(ChatRole::User, "why is K low?"),
                    ChatMessage::new(ChatRole::Assistant, "below optimum"),
                ],
            )
            .await
            .unwrap();
        let updated = table
            .append_chat(&job.job_id, [ChatMessage::new(ChatRole::User, "thanks")])
            .await
            .unwrap();

        let texts: Vec<_> = updated.chat_history.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["why is K low?", "below optimum", "thanks"]);
        assert_eq!(updated.status, JobStatus::Pending);
    }

    #[test]
    fn job_serializes_with_wire_names() {
        let now = chrono::Utc::now();
        let job = Job {
            job_id: "abc".into(),
            tree_id: "T23".into(),
            status: JobStatus::SensorDone,
            created_at: now,
            updated_at: now,
            sensor_data: Some(reading()),
            analysis: None,
            error: None,
            chat_history: Vec::new(),
        };

        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["jobID"], "abc");
        assert_eq!(json["treeID"], "T23");
        assert_eq!(json["status"], "sensorDone");
        assert_eq!(json["sensorData"]["N"], 123.0);
        assert!(json["analysis"].is_null());
        assert!(json["chatHistory"].as_array().unwrap().is_empty());
        assert!(json.get("createdAt").is_some());
    }
}
