//! Domain building blocks shared by every soilsense crate.
//!
//! This crate has zero internal deps so the store, pipeline and API layers
//! can all depend on it without cycles.

pub mod error;
pub mod job_events;
pub mod sensor;
pub mod state_machine;
pub mod topics;
pub mod types;
