//! contrastset - NLI contrast set generation via LLM completion endpoints.
//!
//! ## Architecture
//!
//! For each configured label transition (e.g. entailment → contradiction),
//! source examples with the original label are rewritten by a language model
//! so that the new hypothesis carries the target label.
//!
//! ## Pipeline
//!
//! Corpus → Selector → Prompt → Completion → ContrastRecord
//!        → `{from}_to_{to}.json` → Normalizer → JSONL
//!
//! ## Epistemic Design
//!
//! - K_i (Knowledge): Labels, transitions and record shapes are closed types
//! - B_i (Beliefs): Corpus size, templates and artifacts are checked (Result)
//! - I^R (Resolvable): Model, sample size, seed, delay, strictness via config
//! - I^B (Bounded): Per-example service failures are logged, counted, dropped

pub mod client;
pub mod corpus;
pub mod models;
pub mod pipeline;
pub mod prompt;

// Re-exports for convenience
pub use client::{CompletionService, LLMClient, RateLimiter};
pub use corpus::{Corpus, select};
pub use models::{
    Config, ContrastError, ContrastRecord, Label, NormalizedRecord, Result, SourceExample,
};
pub use pipeline::{ContrastSetAssembler, GenerationEngine, normalize, write_jsonl};
pub use prompt::{LabelTransition, PromptTemplate, TransitionRegistry};
