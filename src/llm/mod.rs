//! LLM integration.
//!
//! The agent talks to models through the [`LlmProvider`] trait. Two
//! implementations exist: [`OpenRouterProvider`] for the hosted router and
//! [`LiteLlmClient`] for a self-hosted LiteLLM proxy.
//!
//! ```ignore
//! use toolbox::llm::{GenerationRequest, LlmProvider, Message, OpenRouterProvider};
//!
//! let provider = OpenRouterProvider::new(api_key);
//! let request = GenerationRequest::new("", vec![Message::user("Hello")]);
//! let response = provider.generate(request).await?;
//! ```

pub mod litellm;
pub mod providers;
pub(crate) mod wire;

pub use litellm::{
    Choice, GenerationRequest, GenerationResponse, LiteLlmClient, LiteLlmSettings, LlmProvider,
    Message, Usage, DEFAULT_MODEL,
};
pub use providers::OpenRouterProvider;
