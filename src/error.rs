//! Error types for toolbox operations.
//!
//! Defines error types for each subsystem:
//! - Snapshot and workspace file access
//! - Containerized builds and tests
//! - Docker engine access
//! - LLM API interactions
//! - Configuration loading
//!
//! `ToolboxError` is what the facade returns; it forwards the message of the
//! underlying error unchanged.

use thiserror::Error;

use crate::agent::AgentError;

/// Errors that can occur while reading or deriving a workspace snapshot.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("no such file or directory: {0}")]
    NotFound(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("invalid path '{0}': must stay inside the workspace")]
    InvalidPath(String),

    #[error("invalid glob pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while building or testing a snapshot.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The build command exited non-zero. Carries stderr verbatim, or stdout
    /// when stderr is blank.
    #[error("{stderr}")]
    BuildFailure { stderr: String },

    /// The test command exited non-zero. Same diagnostic rule as `BuildFailure`.
    #[error("{stderr}")]
    TestFailure { stderr: String },

    /// The container engine could not run the command at all.
    #[error(transparent)]
    Engine(#[from] DockerError),

    /// The workspace has no build capability.
    #[error("build not available: {0}")]
    Unsupported(String),
}

impl BuildError {
    /// Captured diagnostic text for toolchain failures.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            BuildError::BuildFailure { stderr } | BuildError::TestFailure { stderr } => {
                Some(stderr)
            }
            _ => None,
        }
    }
}

/// Errors that can occur during Docker operations.
#[derive(Debug, Error)]
pub enum DockerError {
    #[error("Docker run failed: {0}")]
    RunFailed(String),

    #[error("Failed to pull image '{image}': {message}")]
    PullFailed { image: String, message: String },

    #[error("Failed to copy files to container: {0}")]
    CopyFailed(String),

    #[error("Docker daemon not available: {0}")]
    DaemonUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error(
        "Missing LLM credentials: set --api-key or OPENROUTER_API_KEY, or LITELLM_API_BASE for a LiteLLM proxy"
    )]
    MissingApiKey,

    #[error("Missing API base URL: LITELLM_API_BASE environment variable not set")]
    MissingApiBase,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// A prompt template is missing a required placeholder.
    #[error("Prompt template '{template}' is missing the ${placeholder} placeholder")]
    MissingPlaceholder {
        template: String,
        placeholder: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors returned by the toolbox facade.
#[derive(Debug, Error)]
pub enum ToolboxError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
