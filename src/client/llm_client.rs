//! LLM client for OpenAI-compatible chat completion endpoints.
//!
//! Epistemic foundation:
//! - K_i: OpenAI API schema is the de facto standard
//! - K_i: Gemini, OpenRouter and on-prem servers (vLLM, Ollama) all support it
//! - B_i: API will respond within timeout (might fail)
//! - B_i: Response will be valid JSON with a message (might fail)
//! - I^B: Quotas unknowable → honor 429 Retry-After via RateLimiter

use crate::client::{Completion, CompletionService, MAX_BACKOFF_SECS, RateLimiter};
use crate::models::{Config, ContrastError, ModelConfig, Result, ServiceCallError};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Message in a chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat completion request payload.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
}

/// Chat completion response.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    // Null when the provider filtered the output.
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// API error response (OpenAI-compatible).
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Client for one OpenAI-compatible endpoint and one model.
///
/// Features:
/// - Bearer authentication (optional, for local endpoints)
/// - Status classification (401, 404, 429, 5xx)
/// - Bounded retries for retryable failures (1 attempt by default)
/// - Token usage tracking
pub struct LLMClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: ModelConfig,
    timeout: Duration,
    max_retries: u32,
    rate_limiter: Arc<RateLimiter>,
    total_input_tokens: AtomicU64,
    total_output_tokens: AtomicU64,
}

impl LLMClient {
    /// Create a new LLM client.
    ///
    /// # Arguments
    /// - `api_key`: Optional API key (None for local endpoints)
    /// - `base_url`: Base URL for the API, without `/chat/completions`
    /// - `model`: Model id and sampling parameters
    /// - `timeout_secs`: Request timeout in seconds
    /// - `max_retries`: Attempts per call (minimum 1)
    /// - `rate_limiter`: Shared limiter receiving 429 feedback
    pub fn new(
        api_key: Option<String>,
        base_url: impl Into<String>,
        model: ModelConfig,
        timeout_secs: u64,
        max_retries: u32,
        rate_limiter: Arc<RateLimiter>,
    ) -> Result<Self> {
        let timeout = Duration::from_secs(timeout_secs);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ContrastError::ServiceCall(ServiceCallError::Network(e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model,
            timeout,
            max_retries: max_retries.max(1),
            rate_limiter,
            total_input_tokens: AtomicU64::new(0),
            total_output_tokens: AtomicU64::new(0),
        })
    }

    /// Build a client from configuration.
    pub fn from_config(
        config: &Config,
        api_key: String,
        rate_limiter: Arc<RateLimiter>,
    ) -> Result<Self> {
        Self::new(
            Some(api_key),
            config.service.base_url.clone(),
            config.model.clone(),
            config.service.timeout_secs,
            config.service.max_retries,
            rate_limiter,
        )
    }

    /// Get the model id.
    pub fn model_id(&self) -> &str {
        &self.model.id
    }

    /// Get the rate limiter.
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Build headers for a request.
    fn headers(&self) -> std::result::Result<HeaderMap, ServiceCallError> {
        let mut headers = HeaderMap::new();

        if let Some(ref api_key) = self.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| {
                ServiceCallError::InvalidResponse("API key is not a valid header value".to_string())
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Send one request and classify the outcome.
    async fn attempt(
        &self,
        url: &str,
        request: &ChatCompletionRequest<'_>,
    ) -> std::result::Result<Completion, ServiceCallError> {
        let start = Instant::now();

        let response = self
            .client
            .post(url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceCallError::Timeout(self.timeout)
                } else {
                    ServiceCallError::Network(e)
                }
            })?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        self.rate_limiter.record_response(status, &headers);

        if status == 429 {
            return Err(ServiceCallError::RateLimited {
                retry_after_secs: super::rate_limiter::retry_after_secs(&headers).unwrap_or(1.0),
            });
        }

        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(match status {
                401 | 403 => ServiceCallError::AuthenticationFailed,
                404 => ServiceCallError::ModelNotFound(self.model.id.clone()),
                _ => {
                    let message = serde_json::from_str::<ApiErrorResponse>(&error_body)
                        .map(|e| e.error.message)
                        .unwrap_or(error_body);
                    ServiceCallError::Api { status, message }
                }
            });
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| {
                ServiceCallError::InvalidResponse(format!("Failed to parse response: {e}"))
            })?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ServiceCallError::InvalidResponse("No text in response".to_string()))?;

        let (input_tokens, output_tokens) = body
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));

        self.total_input_tokens
            .fetch_add(input_tokens as u64, Ordering::Relaxed);
        self.total_output_tokens
            .fetch_add(output_tokens as u64, Ordering::Relaxed);

        Ok(Completion {
            text,
            model: body.model.unwrap_or_else(|| self.model.id.clone()),
            input_tokens,
            output_tokens,
            duration: start.elapsed(),
        })
    }

    /// Get total tokens tracked as (input, output).
    pub fn total_tokens(&self) -> (u64, u64) {
        (
            self.total_input_tokens.load(Ordering::Relaxed),
            self.total_output_tokens.load(Ordering::Relaxed),
        )
    }
}

/// Wait before retrying after a transient error: 1s, 2s, 4s, ... capped.
fn retry_backoff(attempt: u32) -> Duration {
    let secs = 2u64.saturating_pow(attempt).min(MAX_BACKOFF_SECS as u64);
    Duration::from_secs(secs)
}

#[async_trait]
impl CompletionService for LLMClient {
    /// Complete a single-turn prompt.
    ///
    /// B_i(API available) → Result
    /// B_i(valid response) → Result
    /// I^B(rate limits) → backoff window, retried only if attempts remain
    async fn complete(&self, prompt: &str) -> std::result::Result<Completion, ServiceCallError> {
        let request = ChatCompletionRequest {
            model: &self.model.id,
            messages: vec![Message::user(prompt)],
            max_tokens: self.model.max_tokens,
            temperature: self.model.temperature,
            top_p: self.model.top_p,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            self.rate_limiter.wait_if_needed().await;

            let error = match self.attempt(&url, &request).await {
                Ok(completion) => return Ok(completion),
                Err(e) => e,
            };

            if !error.is_retryable() || attempt + 1 == self.max_retries {
                last_error = Some(error);
                break;
            }

            // 429 waits are handled by the limiter's backoff window
            if error.retry_after().is_none() {
                let backoff = retry_backoff(attempt);
                debug!(
                    attempt = attempt,
                    backoff_secs = backoff.as_secs(),
                    error = %error,
                    "Retrying after transient error"
                );
                tokio::time::sleep(backoff).await;
            }
            last_error = Some(error);
        }

        let error = last_error.unwrap_or_else(|| ServiceCallError::MaxRetriesExceeded {
            attempts: self.max_retries,
            last_error: "Unknown error".to_string(),
        });

        if self.max_retries > 1 && error.is_retryable() {
            Err(ServiceCallError::MaxRetriesExceeded {
                attempts: self.max_retries,
                last_error: error.to_string(),
            })
        } else {
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn model() -> ModelConfig {
        ModelConfig {
            id: "test-model".to_string(),
            max_tokens: 64,
            temperature: Some(0.7),
            top_p: None,
        }
    }

    fn client(server: &MockServer, max_retries: u32) -> LLMClient {
        LLMClient::new(
            Some("sk-test".to_string()),
            server.uri(),
            model(),
            5,
            max_retries,
            Arc::new(RateLimiter::default()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_complete_returns_message_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "test-model",
                "max_tokens": 64,
                "messages": [{"role": "user", "content": "perturb this"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "test-model-001",
                "choices": [{"message": {"role": "assistant", "content": "  A man is moving.\n"}}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, 1);
        let completion = client.complete("perturb this").await.unwrap();

        assert_eq!(completion.text, "  A man is moving.\n");
        assert_eq!(completion.model, "test-model-001");
        assert_eq!(client.total_tokens(), (12, 5));
    }

    #[test]
    fn test_retry_backoff_is_capped() {
        assert_eq!(retry_backoff(0), Duration::from_secs(1));
        assert_eq!(retry_backoff(3), Duration::from_secs(8));
        assert_eq!(retry_backoff(6), Duration::from_secs(60));
        assert_eq!(retry_backoff(u32::MAX), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_null_content_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": null}}]
            })))
            .mount(&server)
            .await;

        let err = client(&server, 1).complete("x").await.unwrap_err();
        assert!(matches!(err, ServiceCallError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_status_classification() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "bad key"}
            })))
            .mount(&server)
            .await;

        let err = client(&server, 3).complete("x").await.unwrap_err();
        assert!(matches!(err, ServiceCallError::AuthenticationFailed));
    }

    #[tokio::test]
    async fn test_single_attempt_by_default() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": {"message": "internal"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server, 1).complete("x").await.unwrap_err();
        match err {
            ServiceCallError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "internal");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_retries_transient_errors_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "ok"}}]
            })))
            .mount(&server)
            .await;

        let completion = client(&server, 2).complete("x").await.unwrap();
        assert_eq!(completion.text, "ok");
    }
}
