/// Errors returned to callers feeding the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The event loop has stopped; the event was not delivered.
    #[error("Orchestrator is not running")]
    Closed,
}
