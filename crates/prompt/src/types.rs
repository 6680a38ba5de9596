//! Prompt types for MedIntel.

use serde::{Deserialize, Serialize};

/// One retrieved fragment as it appears in the grounding context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    /// Citation label, `REF_1` .. `REF_n` in rank order
    pub label: String,

    /// Title of the parent document
    pub title: String,

    /// Where the document came from (journal, file name, guideline body)
    pub source: String,

    /// Publication year, rendered as `N/A` when unknown
    pub year: Option<i32>,

    /// Full fragment text
    pub text: String,

    /// Similarity to the query
    pub score: f32,
}

impl ContextEntry {
    /// Citation label for the 1-based rank.
    pub fn label_for(rank: usize) -> String {
        format!("REF_{}", rank)
    }
}

/// A fully built prompt ready for LLM execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// System message (optional)
    pub system: Option<String>,

    /// User message (required)
    pub user: String,

    /// Metadata about the built prompt
    pub metadata: BuiltPromptMetadata,
}

/// Metadata about a built prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPromptMetadata {
    /// Template the prompt was rendered from
    #[serde(rename = "templateId")]
    pub template_id: String,

    /// Number of context entries injected
    #[serde(rename = "contextEntries")]
    pub context_entries: usize,
}

impl BuiltPrompt {
    /// Create a new built prompt.
    pub fn new(
        system: Option<String>,
        user: String,
        template_id: impl Into<String>,
        context_entries: usize,
    ) -> Self {
        Self {
            system,
            user,
            metadata: BuiltPromptMetadata {
                template_id: template_id.into(),
                context_entries,
            },
        }
    }
}
