//! Job lifecycle orchestrator.
//!
//! A single [`Orchestrator`] event loop owns every job mutation. Client
//! commands, sensor bus replies and analysis completions all arrive as
//! [`PipelineEvent`]s and are handled one at a time; the only work done
//! off the loop is the analysis call itself, whose outcome is posted back
//! as another event.

pub mod chat;
pub mod command;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod measurement;
pub mod orchestrator;
pub mod router;

pub use command::{Command, CommandRequest};
pub use error::PipelineError;
pub use event::PipelineEvent;
pub use orchestrator::{Orchestrator, OrchestratorHandle};
