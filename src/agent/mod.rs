//! LLM agent sessions over a workspace.
//!
//! The agent sees the workspace only through tools. A session binds a
//! [`SessionState`] (current workspace plus builders), renders a prompt and
//! lets the model call tools until it answers without one:
//!
//! ```ignore
//! use toolbox::agent::{AgentConfig, AgentSession, SessionMode, SessionState};
//!
//! let session = AgentSession::new(llm, AgentConfig::default());
//! let outcome = session
//!     .run(SessionMode::Reader, &prompt, SessionState::new(workspace))
//!     .await?;
//! println!("{}", outcome.last_reply);
//! ```

pub mod prompts;
pub mod session;
pub mod tools;

pub use prompts::{PromptOverrides, PromptSet, CHANGE_LOG_PATH};
pub use session::{
    AgentConfig, AgentSession, JsonToolCallParser, SessionMode, SessionOutcome, ToolCall,
    ToolCallParser,
};
pub use tools::{SessionState, Tool, ToolError, ToolRegistry, ToolResult};

use thiserror::Error;

use crate::error::LlmError;

/// Errors that end an agent session.
#[derive(Debug, Error)]
pub enum AgentError {
    /// LLM provider error.
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// The LLM reply could not be used.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The agent kept calling tools past the configured limit.
    #[error("Step limit exceeded: the agent did not finish within {max_steps} steps")]
    StepLimitExceeded { max_steps: usize },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_errors_pass_through() {
        let err = AgentError::from(LlmError::RateLimited("slow down".to_string()));
        assert_eq!(err.to_string(), "Rate limited: slow down");
    }

    #[test]
    fn test_step_limit_message() {
        let err = AgentError::StepLimitExceeded { max_steps: 7 };
        assert!(err.to_string().contains("7 steps"));
    }
}
