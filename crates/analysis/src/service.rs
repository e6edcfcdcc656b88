use async_trait::async_trait;
use soilsense_core::sensor::SensorReading;

/// External diagnosis provider.
///
/// Timeouts are the provider's concern and surface as
/// [`AnalysisError::Timeout`].
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Diagnose `tree_id` from its reading. The result is opaque to the
    /// caller but is always a JSON object.
    async fn analyze(
        &self,
        tree_id: &str,
        reading: &SensorReading,
    ) -> Result<serde_json::Value, AnalysisError>;

    /// Answer a follow-up `message` about an earlier diagnosis.
    async fn chat(
        &self,
        tree_id: &str,
        analysis: &serde_json::Value,
        message: &str,
    ) -> Result<ChatAnswer, AnalysisError>;
}

/// Assistant answer to a follow-up question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatAnswer {
    pub text: String,
}

/// Errors from the analysis layer.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The provider did not answer in time.
    #[error("timeout")]
    Timeout,

    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(reqwest::Error),

    /// The provider returned a non-2xx status code.
    #[error("Analysis API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The provider answered but the content could not be used.
    #[error("Invalid analysis response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for AnalysisError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AnalysisError::Timeout
        } else {
            AnalysisError::Request(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_reason_is_bare() {
        assert_eq!(AnalysisError::Timeout.to_string(), "timeout");
    }

    #[test]
    fn api_error_mentions_status() {
        let err = AnalysisError::Api {
            status: 503,
            body: "overloaded".into(),
        };
        assert_eq!(err.to_string(), "Analysis API error (503): overloaded");
    }
}
