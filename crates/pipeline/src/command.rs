//! Client commands accepted over the real-time channel.

use serde::{Deserialize, Serialize};
use soilsense_core::types::JobId;

pub const ACTION_START_MEASUREMENT: &str = "startMeasurement";
pub const ACTION_CHAT: &str = "chat";

/// Command fields exactly as a client sends them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    #[serde(default)]
    pub action: String,
    #[serde(rename = "treeID", default)]
    pub tree_id: Option<String>,
    #[serde(rename = "jobID", default)]
    pub job_id: Option<JobId>,
    #[serde(default)]
    pub message: Option<String>,
}

/// A command resolved by action name.
///
/// Required fields stay optional here: a missing field is answered with a
/// failure event rather than rejected at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    StartMeasurement {
        tree_id: Option<String>,
    },
    Chat {
        job_id: Option<JobId>,
        message: Option<String>,
    },
    Unknown {
        action: String,
        job_id: Option<JobId>,
    },
}

impl Command {
    pub fn start_measurement(tree_id: impl Into<String>) -> Self {
        Command::StartMeasurement {
            tree_id: Some(tree_id.into()),
        }
    }

    pub fn chat(job_id: impl Into<JobId>, message: impl Into<String>) -> Self {
        Command::Chat {
            job_id: Some(job_id.into()),
            message: Some(message.into()),
        }
    }
}

/// Empty strings count as missing.
fn present(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.is_empty())
}

impl From<CommandRequest> for Command {
    fn from(request: CommandRequest) -> Self {
        match request.action.as_str() {
            ACTION_START_MEASUREMENT => Command::StartMeasurement {
                tree_id: present(request.tree_id),
            },
            ACTION_CHAT => Command::Chat {
                job_id: present(request.job_id),
                message: present(request.message),
            },
            _ => Command::Unknown {
                action: request.action,
                job_id: present(request.job_id),
            },
        }
    }
}
