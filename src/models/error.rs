//! Error types for contrastset.
//!
//! Epistemic taxonomy:
//! - B_i falsified: Expected failures (bad config, short corpus, bad artifact)
//! - I^B materialized: Completion service failures (network, timeout, quota)
//! - K_i violated: Internal invariant violations (bugs)

use super::Label;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for contrastset.
#[derive(Debug, Error)]
pub enum ContrastError {
    // ═══════════════════════════════════════════════════════════════════
    // B_i FALSIFIED — Belief proven wrong (fatal to the run)
    // ═══════════════════════════════════════════════════════════════════
    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error(
        "Insufficient data for label '{label}': requested {requested} examples, only {available} available"
    )]
    InsufficientData {
        label: Label,
        requested: usize,
        available: usize,
    },

    #[error("Malformed artifact {}: {reason}", path.display())]
    MalformedArtifact { path: PathBuf, reason: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid input: {0}")]
    Input(String),

    // ═══════════════════════════════════════════════════════════════════
    // I^B MATERIALIZED — Recoverable per example, fatal only if escaped
    // ═══════════════════════════════════════════════════════════════════
    #[error("Completion service error: {0}")]
    ServiceCall(#[from] ServiceCallError),

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // ═══════════════════════════════════════════════════════════════════
    // K_i VIOLATED — Invariant broken (bug, should not happen)
    // ═══════════════════════════════════════════════════════════════════
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ContrastError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a malformed-artifact error.
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedArtifact {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// A prompt template that cannot be rendered.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template is missing the {{{slot}}} slot")]
    MissingSlot { slot: &'static str },

    #[error("failed to read template file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Failure of a single completion call.
///
/// K_i: Every variant is recoverable at the batch level; the engine drops the
/// example and moves on.
#[derive(Debug, Error)]
pub enum ServiceCallError {
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: f64 },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Request failed after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },

    #[error("Output rejected: {0}")]
    Rejected(String),
}

impl ServiceCallError {
    /// Check if this error is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::RateLimited { .. } | Self::Network(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Get retry delay hint in seconds, if applicable.
    pub fn retry_after(&self) -> Option<f64> {
        match self {
            Self::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

/// Result type alias for contrastset.
pub type Result<T> = std::result::Result<T, ContrastError>;
