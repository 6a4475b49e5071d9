//! Configuration models for contrastset.
//!
//! All I^R (resolvable ignorance) is parameterized here.
//! The user resolves these unknowns at runtime via config file.

use super::Label;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Top-level configuration for contrastset.
///
/// I^R resolved: All configurable parameters are explicit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Completion endpoint configuration
    #[serde(default)]
    pub service: ServiceConfig,

    /// Model to call
    pub model: ModelConfig,

    /// Source example selection
    pub sampling: SamplingConfig,

    /// Generation settings
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Transitions to run, in order
    #[serde(default)]
    pub transitions: Vec<TransitionConfig>,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Upper bound for `generation.rate_limit_delay_seconds`.
pub const MAX_DELAY_SECS: f64 = 3600.0;

/// Upper bound for `service.max_retries`.
pub const MAX_RETRIES: u32 = 10;

/// OpenAI-compatible completion endpoint.
///
/// K_i: Gemini, OpenRouter, vLLM and Ollama all expose /chat/completions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// API key (can also be set via the `api_key_env` variable)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable name for API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of the endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Attempts per example (1 = no retries)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    1
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

/// Completion model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model ID as understood by the endpoint (e.g., "gemini-1.5-flash")
    pub id: String,

    /// Maximum tokens for the perturbed hypothesis
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature (endpoint default when unset)
    #[serde(default)]
    pub temperature: Option<f64>,

    /// Nucleus sampling (endpoint default when unset)
    #[serde(default)]
    pub top_p: Option<f64>,
}

fn default_max_tokens() -> u32 {
    256
}

/// Source example selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// JSONL corpus with premise, hypothesis and integer label
    pub corpus: PathBuf,

    /// Examples drawn per original label
    #[serde(default = "default_sample_size")]
    pub per_label_sample_size: usize,

    /// Shuffle seed; corpus order when unset
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_sample_size() -> usize {
    100
}

/// How far the model may move away from the original hypothesis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EditStrictness {
    /// Minimal edits, same basic topic
    #[default]
    Minimal,
    /// Free rewrite on the same topic
    FreeForm,
}

impl fmt::Display for EditStrictness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditStrictness::Minimal => write!(f, "minimal"),
            EditStrictness::FreeForm => write!(f, "free-form"),
        }
    }
}

impl std::str::FromStr for EditStrictness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minimal" => Ok(EditStrictness::Minimal),
            "free-form" => Ok(EditStrictness::FreeForm),
            other => Err(format!(
                "unknown editing strictness '{other}' (expected minimal or free-form)"
            )),
        }
    }
}

/// Generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Pause after every completion attempt, successful or not
    #[serde(default = "default_delay")]
    pub rate_limit_delay_seconds: f64,

    /// Strictness for transitions that don't set their own
    #[serde(default)]
    pub editing_strictness: EditStrictness,
}

fn default_delay() -> f64 {
    1.0
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            rate_limit_delay_seconds: default_delay(),
            editing_strictness: EditStrictness::default(),
        }
    }
}

/// One configured label transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionConfig {
    pub from: Label,
    pub to: Label,

    /// Overrides `generation.editing_strictness`
    #[serde(default)]
    pub editing_strictness: Option<EditStrictness>,

    /// Custom template file containing {premise} and {hypothesis}
    #[serde(default)]
    pub template: Option<PathBuf>,
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving one JSON artifact per transition
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Also write every artifact, normalized, to this JSONL file
    #[serde(default)]
    pub combined: Option<PathBuf>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            combined: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// B_i(file exists) → Result
    /// B_i(file is valid TOML) → Result
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_owned(),
                source,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source: e,
        })
    }

    /// Resolve API key from config or environment.
    ///
    /// B_i(api key available) → Result
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        if let Some(key) = &self.service.api_key {
            return Ok(expand_env_vars(key));
        }

        std::env::var(&self.service.api_key_env).map_err(|_| ConfigError::MissingApiKey {
            env_var: self.service.api_key_env.clone(),
        })
    }

    /// Effective strictness for a transition.
    pub fn strictness_for(&self, transition: &TransitionConfig) -> EditStrictness {
        transition
            .editing_strictness
            .unwrap_or(self.generation.editing_strictness)
    }

    /// Distinct original labels, in first-use order.
    pub fn source_labels(&self) -> Vec<Label> {
        let mut labels = Vec::new();
        for t in &self.transitions {
            if !labels.contains(&t.from) {
                labels.push(t.from);
            }
        }
        labels
    }

    /// Validate values serde cannot check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transitions.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one [[transitions]] entry is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for t in &self.transitions {
            if t.from == t.to {
                return Err(ConfigError::InvalidTransition {
                    from: t.from,
                    to: t.to,
                    reason: "original and new label must differ".to_string(),
                });
            }
            if !seen.insert((t.from, t.to)) {
                return Err(ConfigError::InvalidTransition {
                    from: t.from,
                    to: t.to,
                    reason: "configured more than once".to_string(),
                });
            }
        }

        if self.sampling.per_label_sample_size == 0 {
            return Err(ConfigError::Invalid(
                "sampling.per_label_sample_size must be at least 1".to_string(),
            ));
        }

        let delay = self.generation.rate_limit_delay_seconds;
        if !delay.is_finite() || !(0.0..=MAX_DELAY_SECS).contains(&delay) {
            return Err(ConfigError::Invalid(format!(
                "generation.rate_limit_delay_seconds must be between 0 and {MAX_DELAY_SECS}, \
                 got {delay}"
            )));
        }

        if !(1..=MAX_RETRIES).contains(&self.service.max_retries) {
            return Err(ConfigError::Invalid(format!(
                "service.max_retries must be between 1 and {MAX_RETRIES}, got {}",
                self.service.max_retries
            )));
        }

        if self.model.id.trim().is_empty() {
            return Err(ConfigError::Invalid("model.id must not be empty".to_string()));
        }

        Ok(())
    }
}

static ENV_VAR_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid")
});

/// Expand environment variables in a string.
///
/// Supports ${VAR_NAME} syntax.
/// If the variable is not set, the placeholder is left unchanged.
pub fn expand_env_vars(s: &str) -> String {
    ENV_VAR_RE
        .replace_all(s, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

/// Configuration errors.
///
/// Epistemic origin:
/// - B_i falsified: File not found, parse error, invalid values
/// - I^B materialized: Missing required values
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Missing API key: set {env_var} env var or service.api_key in config")]
    MissingApiKey { env_var: String },

    #[error("Invalid transition {from} -> {to}: {reason}")]
    InvalidTransition {
        from: Label,
        to: Label,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
