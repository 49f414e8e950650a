//! Hosted LLM providers.

pub mod openrouter;

pub use openrouter::OpenRouterProvider;
