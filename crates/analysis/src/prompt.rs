//! Prompt construction and reply parsing.

use serde_json::Value;
use soilsense_core::sensor::SensorReading;

use crate::service::{AnalysisError, ChatAnswer};

/// Prompt asking for a structured diagnosis of one reading.
pub fn analysis_prompt(tree_id: &str, reading: &SensorReading) -> String {
    format!(
        "You are an agronomist advising a coconut plantation.\n\
         Tree {tree_id} was measured at {timestamp}.\n\
         Soil nutrients: N = {n} ppm, P = {p} ppm, K = {k} ppm.\n\
         Respond with a single JSON object with the keys \
         \"treeID\", \"nutrient_status\" (N, P and K each with current_ppm, trend, recommendation), \
         \"soil_secondary\", \"image_findings\", \"overall_diagnosis\" \
         (possible_conditions, priority, next_actions) and \"timestamp\". \
         Do not include any text outside the JSON object.",
        timestamp = reading.timestamp.to_rfc3339(),
        n = reading.n,
        p = reading.p,
        k = reading.k,
    )
}

/// Prompt for a follow-up question about an earlier diagnosis.
pub fn chat_prompt(tree_id: &str, analysis: &Value, message: &str) -> String {
    format!(
        "Previous analysis for tree {tree_id}: {analysis}\n\
         Now the user asks: \"{message}\".\n\
         Respond with JSON: {{ \"answer\": \"...\" }}."
    )
}

/// Strip a surrounding Markdown code fence, if any.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the opening fence line.
    let inner = match inner.find('\n') {
        Some(idx) => &inner[idx + 1..],
        None => inner,
    };
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Parse model output as a diagnosis object.
pub fn parse_diagnosis(text: &str) -> Result<Value, AnalysisError> {
    let value: Value = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| AnalysisError::InvalidResponse(format!("diagnosis is not JSON: {e}")))?;
    if !value.is_object() {
        return Err(AnalysisError::InvalidResponse(
            "diagnosis is not a JSON object".into(),
        ));
    }
    Ok(value)
}

/// Parse model output as a chat answer.
///
/// Accepts `{"answer": "..."}`; plain text is taken as the answer itself.
pub fn parse_chat_answer(text: &str) -> Result<ChatAnswer, AnalysisError> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(AnalysisError::InvalidResponse("empty chat answer".into()));
    }
    match serde_json::from_str::<Value>(body) {
        Ok(value) => value
            .get("answer")
            .and_then(Value::as_str)
            .map(|answer| ChatAnswer {
                text: answer.to_string(),
            })
            .ok_or_else(|| AnalysisError::InvalidResponse("chat answer has no \"answer\"".into())),
        Err(_) => Ok(ChatAnswer {
            text: body.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn reading() -> SensorReading {
        SensorReading {
            n: 123.0,
            p: 47.5,
            k: 178.2,
            timestamp: "2025-06-05T10:15:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn analysis_prompt_mentions_reading() {
        let prompt = analysis_prompt("T23", &reading());
        assert!(prompt.contains("Tree T23"));
        assert!(prompt.contains("N = 123 ppm"));
        assert!(prompt.contains("P = 47.5 ppm"));
        assert!(prompt.contains("K = 178.2 ppm"));
    }

    #[test]
    fn chat_prompt_embeds_analysis_and_question() {
        let prompt = chat_prompt("T23", &json!({"priority": "medium"}), "Why is K low?");
        assert!(prompt.contains(r#"{"priority":"medium"}"#));
        assert!(prompt.contains("\"Why is K low?\""));
    }

    #[test]
    fn diagnosis_plain_json() {
        let value = parse_diagnosis(r#"{"treeID":"T23"}"#).unwrap();
        assert_eq!(value["treeID"], "T23");
    }

    #[test]
    fn diagnosis_in_code_fence() {
        let value = parse_diagnosis("```json\n{\"treeID\":\"T23\"}\n```").unwrap();
        assert_eq!(value, json!({"treeID": "T23"}));
    }

    #[test]
    fn diagnosis_must_be_object() {
        assert_matches!(parse_diagnosis("[1, 2]"), Err(AnalysisError::InvalidResponse(_)));
        assert_matches!(parse_diagnosis("sorry, I can't"), Err(AnalysisError::InvalidResponse(_)));
    }

    #[test]
    fn chat_answer_from_json() {
        let answer = parse_chat_answer(r#"{"answer":"Monitor next cycle."}"#).unwrap();
        assert_eq!(answer.text, "Monitor next cycle.");
    }

    #[test]
    fn chat_answer_from_plain_text() {
        let answer = parse_chat_answer("Monitor next cycle.").unwrap();
        assert_eq!(answer.text, "Monitor next cycle.");
    }

    #[test]
    fn chat_answer_rejects_empty_and_keyless() {
        assert!(parse_chat_answer("   ").is_err());
        assert!(parse_chat_answer(r#"{"reply":"x"}"#).is_err());
    }
}
