//! Analysis capability: turns a sensor reading into a diagnosis and
//! answers follow-up questions about it.
//!
//! - [`AnalysisService`]: the trait the orchestrator depends on.
//! - [`GeminiClient`]: HTTP implementation against a Gemini-style
//!   `generateContent` endpoint.
//! - [`StubAnalysis`]: canned diagnosis after a fixed delay, for local
//!   runs without an API key.

pub mod gemini;
pub mod prompt;
pub mod service;
pub mod stub;

pub use gemini::{GeminiClient, GeminiConfig};
pub use service::{AnalysisError, AnalysisService, ChatAnswer};
pub use stub::StubAnalysis;
