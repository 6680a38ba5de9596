//! Query response types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Answer returned when the evidence does not clear the confidence threshold.
pub const REFUSAL_ANSWER: &str = "I'm sorry, I don't have enough verified information to answer that safely. Please consult with a healthcare professional for accurate medical advice.";

/// Warning attached to a refusal.
pub const REFUSAL_WARNING: &str =
    "⚠️ Insufficient verified information available. Please consult a healthcare professional.";

/// Warning attached to every generated answer.
pub const ANSWER_WARNING: &str =
    "Always consult with qualified healthcare professionals for medical decisions.";

/// Warning attached when the generation capability failed.
pub const GENERATION_FAILURE_WARNING: &str =
    "⚠️ The answer could not be generated. Sources are shown for reference only.";

/// Lifecycle of a single query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryState {
    Received,
    Retrieving,
    Insufficient,
    Sufficient,
    Generating,
    Scoring,
    Refused,
    Complete,
}

impl QueryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryState::Received => "received",
            QueryState::Retrieving => "retrieving",
            QueryState::Insufficient => "insufficient",
            QueryState::Sufficient => "sufficient",
            QueryState::Generating => "generating",
            QueryState::Scoring => "scoring",
            QueryState::Refused => "refused",
            QueryState::Complete => "complete",
        }
    }

    /// Whether the query has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueryState::Refused | QueryState::Complete)
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A retrieved fragment as shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Citation label used in the answer (`REF_n`)
    pub ref_label: String,

    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Similarity to the question
    pub score: f32,

    /// Leading text of the fragment, `...` appended when cut
    pub excerpt: String,
}

/// Result of one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub question: String,
    pub answer: String,
    pub sources: Vec<Source>,

    /// Full text of each retrieved fragment, in rank order
    pub contexts: Vec<String>,

    /// Trust in the answer, `[0, 1]`
    pub confidence: f32,

    pub retrieval_time_ms: f64,
    pub generation_time_ms: f64,
    pub total_time_ms: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,

    /// Terminal state: `refused` or `complete`
    pub state: QueryState,
}

impl Response {
    /// Refusal issued when retrieval found no sufficient evidence.
    pub fn refusal(question: impl Into<String>, retrieval_time_ms: f64) -> Self {
        Self {
            question: question.into(),
            answer: REFUSAL_ANSWER.to_string(),
            sources: Vec::new(),
            contexts: Vec::new(),
            confidence: 0.0,
            retrieval_time_ms,
            generation_time_ms: 0.0,
            total_time_ms: retrieval_time_ms,
            warning: Some(REFUSAL_WARNING.to_string()),
            state: QueryState::Refused,
        }
    }

    pub fn is_refusal(&self) -> bool {
        self.state == QueryState::Refused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refusal_response() {
        let response = Response::refusal("What is the capital of France?", 12.5);

        assert_eq!(response.answer, REFUSAL_ANSWER);
        assert!(response.sources.is_empty());
        assert!(response.contexts.is_empty());
        assert_eq!(response.confidence, 0.0);
        assert_eq!(response.generation_time_ms, 0.0);
        assert_eq!(response.total_time_ms, 12.5);
        assert_eq!(response.warning.as_deref(), Some(REFUSAL_WARNING));
        assert!(response.is_refusal());
        assert!(response.state.is_terminal());
    }

    #[test]
    fn test_state_serializes_lowercase() {
        let json = serde_json::to_string(&QueryState::Refused).unwrap();
        assert_eq!(json, "\"refused\"");
        assert_eq!(QueryState::Complete.to_string(), "complete");
        assert!(!QueryState::Generating.is_terminal());
    }

    #[test]
    fn test_source_skips_missing_fields() {
        let source = Source {
            ref_label: "REF_1".to_string(),
            title: "Hypertension".to_string(),
            year: None,
            url: None,
            score: 0.9,
            excerpt: "Blood pressure".to_string(),
        };
        let json = serde_json::to_value(&source).unwrap();
        assert!(json.get("year").is_none());
        assert!(json.get("url").is_none());
        assert_eq!(json["ref_label"], "REF_1");
    }
}
