//! The text-completion seam.
//!
//! K_i: The pipeline only needs "prompt in, text out".
//! B_i: Any call may fail → Result with ServiceCallError

use crate::models::ServiceCallError;
use async_trait::async_trait;
use std::time::Duration;

/// Response from a completion call.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Raw generated text, untrimmed
    pub text: String,
    /// Model that answered (may differ from requested)
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub duration: Duration,
}

impl Completion {
    /// Completion carrying only text.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: String::new(),
            input_tokens: 0,
            output_tokens: 0,
            duration: Duration::ZERO,
        }
    }
}

/// A generative model reachable by a single prompt → text call.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Complete one prompt. No retries are expected of callers.
    async fn complete(&self, prompt: &str) -> Result<Completion, ServiceCallError>;
}
