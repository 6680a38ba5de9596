//! Grounded question answering over the index.
//!
//! The [`Orchestrator`] drives each query through retrieval, the evidence
//! gate, synthesis and confidence scoring.

pub mod orchestrator;
pub mod scoring;
pub mod synthesis;
pub mod types;

pub use orchestrator::Orchestrator;
pub use scoring::ConfidenceScorer;
pub use synthesis::{AnswerSynthesizer, Synthesis};
pub use types::{QueryState, Response, Source, REFUSAL_ANSWER};
