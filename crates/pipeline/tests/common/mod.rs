//! Shared harness for orchestrator tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use soilsense_analysis::{AnalysisError, AnalysisService, ChatAnswer};
use soilsense_core::sensor::SensorReading;
use soilsense_events::{Audience, EventBus, JobNotification, ServerEvent};
use soilsense_pipeline::{CommandRequest, Orchestrator, OrchestratorHandle};
use soilsense_sensorbus::{BusMessage, MemorySensorBus};
use soilsense_store::JobTable;
use tokio::sync::{broadcast, Semaphore};
use tokio_util::sync::CancellationToken;

pub const OBSERVER: &str = "observer-1";
const WAIT: Duration = Duration::from_secs(2);

/// Analysis fake: every `analyze` call waits for a permit, then pops the
/// next scripted result (a default diagnosis when the script is empty).
pub struct ScriptedAnalysis {
    gate: Semaphore,
    results: Mutex<VecDeque<Result<Value, AnalysisError>>>,
    chat_results: Mutex<VecDeque<Result<ChatAnswer, AnalysisError>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedAnalysis {
    pub fn new() -> Self {
        Self {
            gate: Semaphore::new(0),
            results: Mutex::new(VecDeque::new()),
            chat_results: Mutex::new(VecDeque::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn push_result(&self, result: Result<Value, AnalysisError>) {
        self.results.lock().unwrap().push_back(result);
    }

    pub fn push_chat(&self, result: Result<ChatAnswer, AnalysisError>) {
        self.chat_results.lock().unwrap().push_back(result);
    }

    /// Let `n` pending or future `analyze` calls finish.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn calls_for(&self, tree_id: &str) -> usize {
        self.calls.lock().unwrap().get(tree_id).copied().unwrap_or(0)
    }
}

pub fn default_diagnosis() -> Value {
    json!({ "overall_diagnosis": { "priority": "medium" } })
}

#[async_trait]
impl AnalysisService for ScriptedAnalysis {
    async fn analyze(&self, tree_id: &str, _reading: &SensorReading) -> Result<Value, AnalysisError> {
        *self.calls.lock().unwrap().entry(tree_id.to_string()).or_default() += 1;
        self.gate.acquire().await.unwrap().forget();
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(default_diagnosis()))
    }

    async fn chat(&self, _tree_id: &str, _analysis: &Value, message: &str) -> Result<ChatAnswer, AnalysisError> {
        self.chat_results.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(ChatAnswer {
                text: format!("answer to {message}"),
            })
        })
    }
}

pub struct Harness {
    pub jobs: Arc<JobTable>,
    pub bus: Arc<MemorySensorBus>,
    pub analysis: Arc<ScriptedAnalysis>,
    pub handle: OrchestratorHandle,
    pub notifications: broadcast::Receiver<JobNotification>,
    pub published: broadcast::Receiver<BusMessage>,
    cancel: CancellationToken,
}

impl Harness {
    pub async fn start() -> Self {
        let jobs = Arc::new(JobTable::new());
        let bus = Arc::new(MemorySensorBus::new());
        let analysis = Arc::new(ScriptedAnalysis::new());
        let events = Arc::new(EventBus::default());
        let notifications = events.subscribe();
        let published = bus.watch_published();

        let (orchestrator, handle) = Orchestrator::new(
            Arc::clone(&jobs),
            bus.clone(),
            analysis.clone(),
            events,
            "npk",
        );
        let cancel = CancellationToken::new();
        tokio::spawn(orchestrator.run(cancel.clone()));

        Self {
            jobs,
            bus,
            analysis,
            handle,
            notifications,
            published,
            cancel,
        }
    }

    pub async fn command(&self, request: CommandRequest) {
        self.handle.command(OBSERVER, request).await.unwrap();
    }

    pub async fn start_measurement(&self, tree_id: &str) {
        self.command(CommandRequest {
            action: "startMeasurement".into(),
            tree_id: Some(tree_id.into()),
            ..Default::default()
        })
        .await;
    }

    pub async fn chat(&self, job_id: &str, message: &str) {
        self.command(CommandRequest {
            action: "chat".into(),
            job_id: Some(job_id.into()),
            message: Some(message.into()),
            ..Default::default()
        })
        .await;
    }

    /// Start a measurement and return the new job id.
    pub async fn started_job(&mut self, tree_id: &str) -> String {
        self.start_measurement(tree_id).await;
        let started = self.next().await;
        assert!(matches!(started.event, ServerEvent::MeasurementStarted { .. }));
        let job_id = started.job_id.unwrap();
        self.next_publish().await;
        job_id
    }

    pub async fn next(&mut self) -> JobNotification {
        tokio::time::timeout(WAIT, self.notifications.recv())
            .await
            .expect("timed out waiting for a notification")
            .unwrap()
    }

    pub async fn next_publish(&mut self) -> BusMessage {
        tokio::time::timeout(WAIT, self.published.recv())
            .await
            .expect("timed out waiting for a publish")
            .unwrap()
    }

    /// Round-trip an unknown command so every earlier event is handled,
    /// then check nothing else was emitted before its reply.
    pub async fn assert_quiet(&mut self) {
        self.command(CommandRequest {
            action: "noop".into(),
            ..Default::default()
        })
        .await;
        let next = self.next().await;
        assert_eq!(
            next.event,
            ServerEvent::Error {
                reason: "Unknown action: noop".into()
            },
            "unexpected notification {next:?}",
        );
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub fn reply_payload(job_id: &str) -> Vec<u8> {
    json!({
        "jobID": job_id,
        "treeID": "T23",
        "timestamp": "2025-06-05T10:15:00Z",
        "N_ppm": 123.0,
        "P_ppm": 47.5,
        "K_ppm": 178.2,
    })
    .to_string()
    .into_bytes()
}

pub fn response_topic(job_id: &str) -> String {
    format!("npk/read/response/{job_id}")
}

pub fn to_job(job_id: &str) -> Audience {
    Audience::Job(job_id.to_string())
}
