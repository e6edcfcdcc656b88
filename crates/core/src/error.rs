use crate::state_machine::{JobEvent, JobStatus};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid transition: event '{event}' is not allowed from status '{from}'")]
    InvalidTransition { from: JobStatus, event: JobEvent },

    #[error("Internal error: {0}")]
    Internal(String),
}
