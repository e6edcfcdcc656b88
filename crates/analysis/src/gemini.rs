//! HTTP client for a Gemini-style `generateContent` endpoint.
//!
//! Wraps `POST {api_url}/v1beta/models/{model}:generateContent` using
//! [`reqwest`] and extracts the first candidate's text.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use soilsense_core::sensor::SensorReading;

use crate::prompt::{analysis_prompt, chat_prompt, parse_chat_answer, parse_diagnosis};
use crate::service::{AnalysisError, AnalysisService, ChatAnswer};

/// Connection settings for the provider.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Base URL, e.g. `https://generativelanguage.googleapis.com`.
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    /// Whole-request timeout, reported as [`AnalysisError::Timeout`].
    pub timeout: Duration,
}

/// HTTP analysis provider.
pub struct GeminiClient {
    client: reqwest::Client,
    config: GeminiConfig,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GeminiClient {
    /// Build a client whose requests time out after `config.timeout`.
    pub fn new(config: GeminiConfig) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(AnalysisError::Request)?;
        Ok(Self { client, config })
    }

    /// Endpoint for the configured model.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.api_url.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Send one prompt and return the text of the first candidate.
    async fn generate(&self, prompt: &str) -> Result<String, AnalysisError> {
        let body = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| AnalysisError::InvalidResponse(e.to_string()))?;

        parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text)
            .ok_or_else(|| AnalysisError::InvalidResponse("response has no candidate text".into()))
    }
}

#[async_trait]
impl AnalysisService for GeminiClient {
    async fn analyze(
        &self,
        tree_id: &str,
        reading: &SensorReading,
    ) -> Result<serde_json::Value, AnalysisError> {
        tracing::debug!(tree_id, model = %self.config.model, "Requesting diagnosis");
        let text = self.generate(&analysis_prompt(tree_id, reading)).await?;
        parse_diagnosis(&text)
    }

    async fn chat(
        &self,
        tree_id: &str,
        analysis: &serde_json::Value,
        message: &str,
    ) -> Result<ChatAnswer, AnalysisError> {
        tracing::debug!(tree_id, model = %self.config.model, "Requesting chat answer");
        let text = self.generate(&chat_prompt(tree_id, analysis, message)).await?;
        parse_chat_answer(&text)
    }
}
