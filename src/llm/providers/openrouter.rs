//! OpenRouter provider.
//!
//! OpenRouter exposes many model vendors behind one OpenAI-compatible
//! endpoint. Transient failures are retried with exponential backoff.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::error::LlmError;
use crate::llm::litellm::DEFAULT_MODEL;
use crate::llm::wire::{http_client, post_chat, ChatRequest};
use crate::llm::{GenerationRequest, GenerationResponse, LlmProvider};

/// Default OpenRouter API endpoint.
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Maximum number of attempts for transient failures.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff in milliseconds.
const BASE_RETRY_DELAY_MS: u64 = 1000;

/// OpenRouter-backed [`LlmProvider`].
pub struct OpenRouterProvider {
    client: Client,
    api_key: String,
    base_url: String,
    default_model: String,
}

impl OpenRouterProvider {
    /// Create a provider with the default model and endpoint.
    pub fn new(api_key: String) -> Self {
        Self::with_custom_url(
            api_key,
            OPENROUTER_BASE_URL.to_string(),
            DEFAULT_MODEL.to_string(),
        )
    }

    /// Create a provider with a specific default model.
    pub fn with_model(api_key: String, model: String) -> Self {
        Self::with_custom_url(api_key, OPENROUTER_BASE_URL.to_string(), model)
    }

    /// Create a provider against an OpenRouter-compatible proxy.
    pub fn with_custom_url(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: http_client(),
            api_key,
            base_url,
            default_model: model,
        }
    }

    /// API key with everything but the ends masked, for logs.
    pub fn api_key_masked(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        if chars.len() <= 8 {
            return "*".repeat(chars.len());
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn execute_with_retry(&self, body: &ChatRequest) -> Result<GenerationResponse, LlmError> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // 1s, 2s
                let delay_ms = BASE_RETRY_DELAY_MS * (1 << (attempt - 1));
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                tracing::debug!(
                    attempt = attempt + 1,
                    delay_ms = delay_ms,
                    "Retrying OpenRouter request after transient failure"
                );
            }

            match post_chat(&self.client, &self.base_url, Some(&self.api_key), body).await {
                Ok(response) => return Ok(response),
                Err(err) if is_transient_error(&err) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = MAX_RETRIES,
                        error = %err,
                        "Transient error, will retry"
                    );
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            LlmError::RequestFailed("Max retries exceeded with no error captured".to_string())
        }))
    }
}

/// Whether an error is worth retrying.
fn is_transient_error(error: &LlmError) -> bool {
    match error {
        LlmError::RequestFailed(msg) => {
            let msg = msg.to_lowercase();
            msg.contains("timeout") || msg.contains("connection") || msg.contains("temporarily")
        }
        LlmError::RateLimited(_) => true,
        LlmError::ApiError { code, .. } => *code >= 500 || *code == 429,
        _ => false,
    }
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let body = ChatRequest::from_request(request, &self.default_model);
        tracing::debug!(
            model = %body.model,
            key = %self.api_key_masked(),
            messages = body.messages.len(),
            "OpenRouter request"
        );
        self.execute_with_retry(&body).await
    }
}
