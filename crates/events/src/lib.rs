//! Outbound job-update events and the in-process bus that carries them.
//!
//! - [`ServerEvent`]: closed set of events an observer can receive.
//! - [`JobUpdate`]: the `{action, jobID, data}` wire envelope.
//! - [`JobNotification`]: an event plus the [`Audience`] it is meant for.
//! - [`EventBus`]: `tokio::sync::broadcast` fan-out from the orchestrator
//!   to the notification hub.

pub mod bus;
pub mod notification;

pub use bus::EventBus;
pub use notification::{Audience, JobNotification, JobUpdate, ServerEvent};
