//! Fixed texts of the grounding contract.

/// Identifier recorded in [`crate::BuiltPromptMetadata`].
pub const GROUNDING_TEMPLATE_ID: &str = "medintel.grounding";

/// Sentence the model must use when the context does not answer the question.
pub const INSUFFICIENT_EVIDENCE_SENTENCE: &str =
    "I'm sorry, I don't have enough verified information to answer that safely.";

/// Canonical educational-use disclaimer.
pub const DISCLAIMER: &str = "⚠️ This information is for educational purposes only and is not a substitute for professional medical advice.";

/// Phrase whose presence (case-insensitive) means the disclaimer is already there.
pub const DISCLAIMER_MARKER: &str = "educational purposes";

/// Rules given to the model as the system message.
pub const GROUNDING_SYSTEM_PROMPT: &str = "You are MedIntel, a medical AI assistant designed to provide fact-based, reliable, and explainable answers.
You are connected to a retrieval system that provides verified medical documents.
Your task is to answer medical queries using ONLY the information retrieved below.

CRITICAL RULES:
1. Use clear, simple language while maintaining medical accuracy
2. Every factual claim MUST have a citation in the format [REF_X] where X is the reference number
3. At the end of your response, list all sources as: \"Sources: [REF_1: Title], [REF_2: Title], ...\"
4. If the retrieved documents do not answer the question, reply: \"I'm sorry, I don't have enough verified information to answer that safely.\"
5. NEVER fabricate or infer medical facts not present in the retrieved documents
6. Do NOT diagnose users or prescribe treatments. Your purpose is to inform, not diagnose.
7. Always include this disclaimer: \"⚠️ This information is for educational purposes only and is not a substitute for professional medical advice.\"";

/// One block per retrieved fragment; `separator` is the blank line between blocks.
pub(crate) const CONTEXT_TEMPLATE: &str = "{{#each entries}}[{{label}}] {{title}} ({{source}}, {{year}})
Content: {{text}}
Relevance Score: {{score}}{{separator}}{{/each}}";

/// User message wrapping the rendered context and the question.
pub(crate) const USER_TEMPLATE: &str = "Retrieved Context:
{{context}}

User Query: {{question}}

Provide your answer with inline citations:";
