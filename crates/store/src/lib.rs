//! In-memory job table.
//!
//! Records live for the lifetime of the process; there is no durability
//! and nothing is ever evicted.

pub mod models;
pub mod table;

pub use models::{ChatMessage, ChatRole, Job, JobPatch, JobSnapshot};
pub use table::JobTable;
