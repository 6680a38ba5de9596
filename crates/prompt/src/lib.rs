//! Grounding prompt construction for MedIntel.
//!
//! Renders retrieved fragments into a numbered `[REF_n]` context block and
//! wraps it, together with the question, in the grounding contract: cite every
//! claim, use the fixed insufficiency sentence when the context falls short,
//! never diagnose, and include the educational-use disclaimer.

pub mod builder;
pub mod templates;
pub mod types;

pub use builder::PromptBuilder;
pub use templates::{
    DISCLAIMER, DISCLAIMER_MARKER, GROUNDING_SYSTEM_PROMPT, GROUNDING_TEMPLATE_ID,
    INSUFFICIENT_EVIDENCE_SENTENCE,
};
pub use types::{BuiltPrompt, BuiltPromptMetadata, ContextEntry};
