//! OpenAI-compatible chat completion wire format.
//!
//! Both OpenRouter and LiteLLM proxies speak this format; the clients differ
//! only in endpoint, authentication and retry policy.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::litellm::{Choice, GenerationRequest, GenerationResponse, Message, Usage};
use crate::error::LlmError;

/// Request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Builds the HTTP client shared by the providers.
pub(crate) fn http_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default HTTP client");
            Client::new()
        })
}

/// Request body for `/chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    /// Builds the body, falling back to `default_model` when none was asked for.
    pub fn from_request(request: GenerationRequest, default_model: &str) -> Self {
        let model = if request.model.is_empty() {
            default_model.to_string()
        } else {
            request.model
        };
        Self {
            model,
            messages: request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    index: u32,
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    role: String,
    // some providers send null content alongside a refusal
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl From<ChatResponse> for GenerationResponse {
    fn from(response: ChatResponse) -> Self {
        let choices = response
            .choices
            .into_iter()
            .map(|choice| Choice {
                index: choice.index,
                message: Message {
                    role: choice.message.role,
                    content: choice.message.content.unwrap_or_default(),
                },
                finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            })
            .collect();

        let usage = response.usage.map_or(
            Usage {
                prompt_tokens: 0,
                completion_tokens: 0,
                total_tokens: 0,
            },
            |u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            },
        );

        Self {
            id: response.id,
            model: response.model,
            choices,
            usage,
        }
    }
}

/// Maps a non-success HTTP status and body to an [`LlmError`].
pub(crate) fn error_from_status(status_code: u16, body: &str) -> LlmError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.to_string());

    if status_code == 429 {
        LlmError::RateLimited(message)
    } else {
        LlmError::ApiError {
            code: status_code,
            message,
        }
    }
}

/// Posts one chat completion request.
pub(crate) async fn post_chat(
    client: &Client,
    base_url: &str,
    api_key: Option<&str>,
    request: &ChatRequest,
) -> Result<GenerationResponse, LlmError> {
    let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));

    let mut http_request = client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("HTTP-Referer", "https://github.com/toolbox")
        .header("X-Title", "toolbox");

    if let Some(key) = api_key {
        http_request = http_request.header("Authorization", format!("Bearer {key}"));
    }

    let http_response = http_request
        .json(request)
        .send()
        .await
        .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

    let status = http_response.status();
    if !status.is_success() {
        let body = http_response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error response".to_string());
        return Err(error_from_status(status.as_u16(), &body));
    }

    let response: ChatResponse = http_response
        .json()
        .await
        .map_err(|e| LlmError::ParseError(format!("Failed to parse API response: {e}")))?;

    Ok(response.into())
}
