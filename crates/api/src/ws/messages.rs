//! Inbound frames sent by real-time observers.

use serde::Deserialize;
use soilsense_core::types::JobId;
use soilsense_pipeline::CommandRequest;

/// A JSON text frame from an observer, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Subscribe {
        #[serde(rename = "jobID")]
        job_id: JobId,
    },
    Unsubscribe {
        #[serde(rename = "jobID")]
        job_id: JobId,
    },
    Command(CommandRequest),
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
