//! Canned analysis provider.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use soilsense_core::sensor::SensorReading;

use crate::service::{AnalysisError, AnalysisService, ChatAnswer};

/// Returns a fixed diagnosis after `delay`; never fails.
#[derive(Debug, Clone)]
pub struct StubAnalysis {
    pub delay: Duration,
    pub chat_delay: Duration,
}

impl StubAnalysis {
    pub fn new(delay: Duration, chat_delay: Duration) -> Self {
        Self { delay, chat_delay }
    }
}

impl Default for StubAnalysis {
    fn default() -> Self {
        Self::new(Duration::from_millis(1500), Duration::from_millis(800))
    }
}

#[async_trait]
impl AnalysisService for StubAnalysis {
    async fn analyze(
        &self,
        tree_id: &str,
        _reading: &SensorReading,
    ) -> Result<serde_json::Value, AnalysisError> {
        tracing::debug!(tree_id, "Stub analysis requested");
        tokio::time::sleep(self.delay).await;

        Ok(json!({
            "treeID": tree_id,
            "nutrient_status": {
                "N": { "current_ppm": 120, "trend": "stable", "recommendation": "No N needed" },
                "P": { "current_ppm": 45, "trend": "stable", "recommendation": "Apply 25g SSP in 2 days" },
                "K": { "current_ppm": 180, "trend": "slightly falling", "recommendation": "Apply 50g KCl" },
            },
            "soil_secondary": {
                "pH": { "current": 6.8, "recommendation": "pH is ideal" },
                "moisture_pct": { "current": 32, "recommendation": "Irrigate in next 4h" },
            },
            "image_findings": {
                "top_prediction": "None yet",
                "confidence": 0.0,
                "note": "No image analysis performed",
            },
            "overall_diagnosis": {
                "possible_conditions": ["Early Nitrogen Deficiency"],
                "priority": "medium",
                "next_actions": [
                    "Apply 50g KCl",
                    "Irrigate to raise moisture to 35%",
                    "Monitor next 3 days",
                ],
            },
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }))
    }

    async fn chat(
        &self,
        tree_id: &str,
        _analysis: &serde_json::Value,
        _message: &str,
    ) -> Result<ChatAnswer, AnalysisError> {
        tracing::debug!(tree_id, "Stub chat requested");
        tokio::time::sleep(self.chat_delay).await;
        Ok(ChatAnswer {
            text: "Because K is 180 ppm and optimal is 200 ppm, it's slightly low. \
                   Monitor next cycle."
                .into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading() -> SensorReading {
        SensorReading {
            n: 1.0,
            p: 2.0,
            k: 3.0,
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn stub_diagnosis_names_tree() {
        let stub = StubAnalysis::new(Duration::ZERO, Duration::ZERO);
        let diagnosis = stub.analyze("T23", &reading()).await.unwrap();

        assert_eq!(diagnosis["treeID"], "T23");
        assert_eq!(diagnosis["overall_diagnosis"]["priority"], "medium");
        assert!(diagnosis.is_object());
    }

    #[tokio::test]
    async fn stub_chat_answers() {
        let stub = StubAnalysis::new(Duration::ZERO, Duration::ZERO);
        let answer = stub.chat("T23", &json!({}), "why?").await.unwrap();
        assert!(answer.text.contains("Monitor next cycle."));
    }
}
