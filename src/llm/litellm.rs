//! Chat message types, the provider trait and the LiteLLM-compatible client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::wire::{http_client, post_chat, ChatRequest};
use crate::error::LlmError;

/// Default model when neither the request nor the environment names one.
pub const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4";

/// A message in a conversation with an LLM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender (e.g., "system", "user", "assistant").
    pub role: String,
    /// Content of the message.
    pub content: String,
}

impl Message {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Request for text generation from an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model identifier; empty means the provider's default.
    pub model: String,
    /// Conversation messages.
    pub messages: Vec<Message>,
    /// Sampling temperature (0.0 - 2.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Maximum number of tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    /// Create a new generation request with default parameters.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Set the temperature for this request.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the max tokens for this request.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Response from an LLM generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub id: String,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
}

impl GenerationResponse {
    /// Get the content of the first choice, if available.
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

/// A single generated choice from the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: Message,
    /// Reason the generation stopped (e.g., "stop", "length").
    pub finish_reason: String,
}

/// Token usage statistics for a generation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Trait for LLM providers that can generate text.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a response for the given request.
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError>;
}

/// Where a LiteLLM proxy lives and how to call it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteLlmSettings {
    pub api_base: String,
    pub api_key: Option<String>,
    /// Used when a request leaves `model` empty.
    pub default_model: String,
}

impl LiteLlmSettings {
    /// Reads `LITELLM_API_BASE` (required), `LITELLM_API_KEY` and
    /// `LITELLM_DEFAULT_MODEL` through `lookup`. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LlmError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|val| !val.trim().is_empty());

        Ok(Self {
            api_base: read("LITELLM_API_BASE").ok_or(LlmError::MissingApiBase)?,
            api_key: read("LITELLM_API_KEY"),
            default_model: read("LITELLM_DEFAULT_MODEL")
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}

/// Client for LiteLLM-compatible proxies.
pub struct LiteLlmClient {
    settings: LiteLlmSettings,
    http_client: Client,
}

impl LiteLlmClient {
    pub fn new(settings: LiteLlmSettings) -> Self {
        Self {
            settings,
            http_client: http_client(),
        }
    }
}

#[async_trait]
impl LlmProvider for LiteLlmClient {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let settings = &self.settings;
        let body = ChatRequest::from_request(request, &settings.default_model);
        tracing::debug!(
            api_base = %settings.api_base,
            model = %body.model,
            messages = body.messages.len(),
            "LiteLLM request"
        );
        post_chat(
            &self.http_client,
            &settings.api_base,
            settings.api_key.as_deref(),
            &body,
        )
        .await
    }
}
