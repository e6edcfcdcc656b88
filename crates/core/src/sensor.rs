//! Sensor readings and the reply payload published by field devices.

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// One NPK reading as stored on a job and forwarded to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Nitrogen, ppm.
    #[serde(rename = "N")]
    pub n: f64,
    /// Phosphorus, ppm.
    #[serde(rename = "P")]
    pub p: f64,
    /// Potassium, ppm.
    #[serde(rename = "K")]
    pub k: f64,
    /// When the device took the reading.
    pub timestamp: Timestamp,
}

/// Payload a device publishes on `<ns>/read/response/<jobID>`.
///
/// `jobID` and `treeID` are echoed by the device but correlation relies
/// on the topic, so both are optional here.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SensorReply {
    #[serde(rename = "jobID", default)]
    pub job_id: Option<String>,
    #[serde(rename = "treeID", default)]
    pub tree_id: Option<String>,
    pub timestamp: Timestamp,
    #[serde(rename = "N_ppm")]
    pub n_ppm: f64,
    #[serde(rename = "P_ppm")]
    pub p_ppm: f64,
    #[serde(rename = "K_ppm")]
    pub k_ppm: f64,
}

impl SensorReply {
    /// Parse a raw bus payload.
    pub fn parse(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }

    /// Project the reply onto the reading stored on the job.
    pub fn reading(&self) -> SensorReading {
        SensorReading {
            n: self.n_ppm,
            p: self.p_ppm,
            k: self.k_ppm,
            timestamp: self.timestamp,
        }
    }
}
