//! Prompt builder for rendering the grounding template and injecting context.

use crate::templates::{
    CONTEXT_TEMPLATE, GROUNDING_SYSTEM_PROMPT, GROUNDING_TEMPLATE_ID, USER_TEMPLATE,
};
use crate::types::{BuiltPrompt, ContextEntry};
use handlebars::Handlebars;
use medintel_core::{AppError, AppResult};
use serde::Serialize;

const CONTEXT_TEMPLATE_NAME: &str = "grounding.context";
const USER_TEMPLATE_NAME: &str = "grounding.user";

/// Display form of a [`ContextEntry`] handed to the template.
#[derive(Serialize)]
struct EntryView<'a> {
    label: &'a str,
    title: &'a str,
    source: &'a str,
    year: String,
    text: &'a str,
    score: String,
    separator: &'static str,
}

impl<'a> From<&'a ContextEntry> for EntryView<'a> {
    fn from(entry: &'a ContextEntry) -> Self {
        Self {
            label: &entry.label,
            title: &entry.title,
            source: &entry.source,
            year: entry
                .year
                .map(|y| y.to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            text: &entry.text,
            score: format!("{:.3}", entry.score),
            separator: "\n\n",
        }
    }
}

#[derive(Serialize)]
struct ContextData<'a> {
    entries: Vec<EntryView<'a>>,
}

#[derive(Serialize)]
struct UserData<'a> {
    context: &'a str,
    question: &'a str,
}

/// Renders grounding prompts.
///
/// Templates are compiled once; a builder is shared read-only across
/// concurrent queries.
pub struct PromptBuilder {
    registry: Handlebars<'static>,
}

impl PromptBuilder {
    /// Create a builder with the grounding templates registered.
    pub fn new() -> AppResult<Self> {
        let mut registry = Handlebars::new();

        // Disable HTML escaping for plain text
        registry.register_escape_fn(handlebars::no_escape);

        registry
            .register_template_string(CONTEXT_TEMPLATE_NAME, CONTEXT_TEMPLATE)
            .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;
        registry
            .register_template_string(USER_TEMPLATE_NAME, USER_TEMPLATE)
            .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

        Ok(Self { registry })
    }

    /// Render the numbered context block for `entries`, in the given order.
    pub fn render_context(&self, entries: &[ContextEntry]) -> AppResult<String> {
        let data = ContextData {
            entries: entries.iter().map(EntryView::from).collect(),
        };

        let rendered = self
            .registry
            .render(CONTEXT_TEMPLATE_NAME, &data)
            .map_err(|e| AppError::Prompt(format!("Failed to render context: {}", e)))?;

        Ok(rendered.trim_end().to_string())
    }

    /// Build the grounding prompt for `question` over the ranked `entries`.
    ///
    /// The system message carries the answering rules; the user message
    /// carries the context block and the question.
    pub fn build_grounding_prompt(
        &self,
        question: &str,
        entries: &[ContextEntry],
    ) -> AppResult<BuiltPrompt> {
        tracing::debug!(entries = entries.len(), "Building grounding prompt");

        let context = self.render_context(entries)?;
        let user = self
            .registry
            .render(
                USER_TEMPLATE_NAME,
                &UserData {
                    context: &context,
                    question,
                },
            )
            .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

        Ok(BuiltPrompt::new(
            Some(GROUNDING_SYSTEM_PROMPT.to_string()),
            user,
            GROUNDING_TEMPLATE_ID,
            entries.len(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(rank: usize, title: &str, year: Option<i32>, text: &str, score: f32) -> ContextEntry {
        ContextEntry {
            label: ContextEntry::label_for(rank),
            title: title.to_string(),
            source: "WHO Guidelines".to_string(),
            year,
            text: text.to_string(),
            score,
        }
    }

    #[test]
    fn test_render_single_entry() {
        let builder = PromptBuilder::new().unwrap();
        let rendered = builder
            .render_context(&[entry(1, "Hypertension", Some(2021), "BP above 140/90.", 0.9)])
            .unwrap();

        assert_eq!(
            rendered,
            "[REF_1] Hypertension (WHO Guidelines, 2021)\nContent: BP above 140/90.\nRelevance Score: 0.900"
        );
    }

    #[test]
    fn test_render_missing_year_as_na() {
        let builder = PromptBuilder::new().unwrap();
        let rendered = builder
            .render_context(&[entry(1, "Diabetes", None, "HbA1c >= 6.5%.", 0.81234)])
            .unwrap();

        assert!(rendered.contains("(WHO Guidelines, N/A)"));
        assert!(rendered.contains("Relevance Score: 0.812"));
    }

    #[test]
    fn test_entries_keep_rank_order() {
        let builder = PromptBuilder::new().unwrap();
        let rendered = builder
            .render_context(&[
                entry(1, "First", Some(2020), "a", 0.9),
                entry(2, "Second", Some(2019), "b", 0.8),
            ])
            .unwrap();

        let first = rendered.find("[REF_1] First").unwrap();
        let second = rendered.find("[REF_2] Second").unwrap();
        assert!(first < second);
        assert!(rendered.contains("Relevance Score: 0.900\n\n[REF_2]"));
    }

    #[test]
    fn test_text_is_not_html_escaped() {
        let builder = PromptBuilder::new().unwrap();
        let rendered = builder
            .render_context(&[entry(1, "Labs", None, "glucose < 100 & fasting", 0.9)])
            .unwrap();
        assert!(rendered.contains("glucose < 100 & fasting"));
    }

    #[test]
    fn test_build_grounding_prompt() {
        let builder = PromptBuilder::new().unwrap();
        let built = builder
            .build_grounding_prompt(
                "What is hypertension?",
                &[entry(1, "Hypertension", Some(2021), "BP above 140/90.", 0.9)],
            )
            .unwrap();

        let system = built.system.unwrap();
        assert!(system.contains("[REF_X]"));
        assert!(system.contains("educational purposes"));
        assert!(built.user.starts_with("Retrieved Context:\n[REF_1] Hypertension"));
        assert!(built
            .user
            .ends_with("User Query: What is hypertension?\n\nProvide your answer with inline citations:"));
        assert_eq!(built.metadata.template_id, GROUNDING_TEMPLATE_ID);
        assert_eq!(built.metadata.context_entries, 1);
    }
}
