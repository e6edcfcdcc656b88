//! The orchestrator event loop.
//!
//! [`Orchestrator`] holds injected references to the job table, the sensor
//! bus, the analysis capability and the event bus. It is the only writer
//! of job records. Outside code talks to it through a cloneable
//! [`OrchestratorHandle`].

use std::collections::HashSet;
use std::sync::Arc;

use soilsense_analysis::AnalysisService;
use soilsense_core::error::CoreError;
use soilsense_core::state_machine::{transition, JobEvent};
use soilsense_core::types::{JobId, ObserverId};
use soilsense_events::{EventBus, JobNotification, ServerEvent};
use soilsense_sensorbus::SensorBus;
use soilsense_store::{Job, JobPatch, JobTable};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::command::{Command, CommandRequest};
use crate::error::PipelineError;
use crate::event::PipelineEvent;

/// Capacity of the inbound event queue.
const EVENT_QUEUE_CAPACITY: usize = 256;

/// Sends events into a running [`Orchestrator`].
#[derive(Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::Sender<PipelineEvent>,
}

impl OrchestratorHandle {
    /// Queue any pipeline event.
    pub async fn send(&self, event: PipelineEvent) -> Result<(), PipelineError> {
        self.tx.send(event).await.map_err(|_| PipelineError::Closed)
    }

    /// Queue a client command on behalf of `observer`.
    pub async fn command(
        &self,
        observer: impl Into<ObserverId>,
        request: CommandRequest,
    ) -> Result<(), PipelineError> {
        self.send(PipelineEvent::Command {
            observer: observer.into(),
            command: Command::from(request),
        })
        .await
    }

    /// Ask for a `jobStatus` snapshot of `job_id` to be sent to `observer`.
    ///
    /// The snapshot is read and published on the loop, so it is ordered
    /// with every broadcast for the job.
    pub async fn subscribe(
        &self,
        observer: impl Into<ObserverId>,
        job_id: impl Into<JobId>,
    ) -> Result<(), PipelineError> {
        self.send(PipelineEvent::Subscribe {
            observer: observer.into(),
            job_id: job_id.into(),
        })
        .await
    }

    /// Force `job_id` to `failed` from outside the pipeline.
    pub async fn fail_job(
        &self,
        job_id: impl Into<JobId>,
        reason: impl Into<String>,
    ) -> Result<(), PipelineError> {
        self.send(PipelineEvent::ExternalError {
            job_id: job_id.into(),
            reason: reason.into(),
        })
        .await
    }
}

/// Single-writer job lifecycle engine.
pub struct Orchestrator {
    pub(crate) jobs: Arc<JobTable>,
    pub(crate) sensor_bus: Arc<dyn SensorBus>,
    pub(crate) analysis: Arc<dyn AnalysisService>,
    pub(crate) events: Arc<EventBus>,
    pub(crate) namespace: String,
    /// Jobs with an analysis call outstanding.
    pub(crate) in_flight: HashSet<JobId>,
    /// Completion events from spawned analysis and chat calls come back
    /// through this sender.
    pub(crate) tx: mpsc::Sender<PipelineEvent>,
    rx: mpsc::Receiver<PipelineEvent>,
}

impl Orchestrator {
    /// Build an orchestrator and the handle used to feed it.
    ///
    /// Nothing happens until [`run`](Self::run) is awaited.
    pub fn new(
        jobs: Arc<JobTable>,
        sensor_bus: Arc<dyn SensorBus>,
        analysis: Arc<dyn AnalysisService>,
        events: Arc<EventBus>,
        namespace: impl Into<String>,
    ) -> (Self, OrchestratorHandle) {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let handle = OrchestratorHandle { tx: tx.clone() };
        let orchestrator = Self {
            jobs,
            sensor_bus,
            analysis,
            events,
            namespace: namespace.into(),
            in_flight: HashSet::new(),
            tx,
            rx,
        };
        (orchestrator, handle)
    }

    /// Process events until `cancel` fires.
    ///
    /// Sensor bus messages are read from the bus subscription taken when
    /// the loop starts; everything else arrives through the handle.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut bus_rx = self.sensor_bus.subscribe();
        let mut bus_open = true;
        tracing::info!(namespace = %self.namespace, "Orchestrator started");

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                received = self.rx.recv() => match received {
                    Some(event) => event,
                    None => break,
                },
                received = bus_rx.recv(), if bus_open => match received {
                    Ok(msg) => PipelineEvent::SensorMessage {
                        topic: msg.topic,
                        payload: msg.payload,
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Orchestrator lagged behind the sensor bus");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::error!("Sensor bus subscription closed");
                        bus_open = false;
                        continue;
                    }
                },
            };

            self.handle_event(event).await;
        }

        tracing::info!(
            in_flight = self.in_flight.len(),
            "Orchestrator shutting down",
        );
    }

    /// Handle one event to completion.
    pub async fn handle_event(&mut self, event: PipelineEvent) {
        tracing::trace!(kind = event.kind(), "Handling pipeline event");
        match event {
            PipelineEvent::Command { observer, command } => {
                self.on_command(observer, command).await;
            }
            PipelineEvent::Subscribe { observer, job_id } => {
                self.on_subscribe(observer, job_id).await;
            }
            PipelineEvent::SensorMessage { topic, payload } => {
                self.on_sensor_message(&topic, &payload).await;
            }
            PipelineEvent::AnalysisCompleted { job_id, result } => {
                self.on_analysis_completed(job_id, result).await;
            }
            PipelineEvent::ChatCompleted {
                observer,
                job_id,
                message,
                result,
            } => {
                self.on_chat_completed(observer, job_id, message, result)
                    .await;
            }
            PipelineEvent::ExternalError { job_id, reason } => {
                self.on_external_error(job_id, reason).await;
            }
        }
    }

    async fn on_command(&mut self, observer: ObserverId, command: Command) {
        match command {
            Command::StartMeasurement { tree_id } => {
                self.start_measurement(observer, tree_id).await;
            }
            Command::Chat { job_id, message } => {
                self.start_chat(observer, job_id, message).await;
            }
            Command::Unknown { action, job_id } => {
                tracing::warn!(observer = %observer, action = %action, "Unknown command action");
                self.notify(JobNotification::to_observer(
                    observer,
                    job_id,
                    ServerEvent::Error {
                        reason: format!("Unknown action: {action}"),
                    },
                ));
            }
        }
    }

    async fn on_subscribe(&mut self, observer: ObserverId, job_id: JobId) {
        let Some(job) = self.jobs.get(&job_id).await else {
            tracing::debug!(observer = %observer, job_id = %job_id, "Subscribed to unknown job");
            return;
        };
        self.notify(JobNotification::to_observer(
            observer,
            Some(job_id),
            ServerEvent::JobStatus(job.snapshot()),
        ));
    }

    async fn on_external_error(&mut self, job_id: JobId, reason: String) {
        let Some(job) = self.jobs.get(&job_id).await else {
            tracing::debug!(job_id = %job_id, "External error for unknown job ignored");
            return;
        };

        match self
            .advance(
                &job,
                JobEvent::ExternalError,
                JobPatch::default().with_error(reason.clone()),
            )
            .await
        {
            Ok(_) => {
                self.notify(JobNotification::to_job(
                    job_id,
                    ServerEvent::Error { reason },
                ));
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "External error discarded");
            }
        }
    }

    /// Apply `event` to `job` through the state machine and merge `patch`.
    ///
    /// The record is untouched when the transition is rejected.
    pub(crate) async fn advance(
        &self,
        job: &Job,
        event: JobEvent,
        patch: JobPatch,
    ) -> Result<Job, CoreError> {
        let next = transition(job.status, event)?;
        let patch = JobPatch {
            status: Some(next),
            ..patch
        };
        let updated = self
            .jobs
            .update(&job.job_id, patch)
            .await
            .ok_or_else(|| CoreError::NotFound {
                entity: "job",
                id: job.job_id.clone(),
            })?;

        tracing::info!(
            job_id = %job.job_id,
            from = %job.status,
            to = %next,
            event = %event,
            "Job status changed",
        );
        Ok(updated)
    }

    pub(crate) fn notify(&self, notification: JobNotification) {
        self.events.publish(notification);
    }
}
