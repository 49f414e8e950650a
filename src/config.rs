//! Toolbox configuration.
//!
//! Groups the agent, build container and prompt settings. Values start from
//! their defaults and can be overridden from the environment with
//! [`ToolboxConfig::from_env`] or the builder methods.

use std::path::Path;

use crate::agent::{AgentConfig, PromptSet};
use crate::builder::{DEFAULT_GO_IMAGE, DEFAULT_MAVEN_IMAGE};
use crate::error::ConfigError;
use crate::execution::ExecutionLimits;
use crate::llm::DEFAULT_MODEL;

/// Configuration for a [`Toolbox`](crate::toolbox::Toolbox).
#[derive(Debug, Clone)]
pub struct ToolboxConfig {
    // Agent settings
    /// Model to request from the LLM provider.
    pub model: String,
    /// Maximum number of LLM replies in one session.
    pub max_steps: usize,
    /// Temperature for LLM sampling.
    pub temperature: f64,
    /// Maximum tokens for each LLM reply.
    pub max_tokens: u32,

    // Build settings
    /// Image the Maven builder runs in.
    pub maven_image: String,
    /// Image the Go builder runs in.
    pub go_image: String,
    /// Memory limit for build containers (in MB).
    pub build_memory_mb: u64,
    /// CPU cores allocated to build containers.
    pub build_cpu_cores: f64,

    // Prompt settings
    /// Reader/editor templates and fixed assignments.
    pub prompts: PromptSet,
}

impl Default for ToolboxConfig {
    fn default() -> Self {
        let limits = ExecutionLimits::default();
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_steps: 50,
            temperature: 0.2,
            max_tokens: 4096,
            maven_image: DEFAULT_MAVEN_IMAGE.to_string(),
            go_image: DEFAULT_GO_IMAGE.to_string(),
            build_memory_mb: limits.memory_mb,
            build_cpu_cores: limits.cpu_cores,
            prompts: PromptSet::default(),
        }
    }
}

impl ToolboxConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `TOOLBOX_MODEL`: Model name (default: anthropic/claude-sonnet-4)
    /// - `TOOLBOX_MAX_STEPS`: Maximum agent steps per session (default: 50)
    /// - `TOOLBOX_TEMPERATURE`: LLM temperature (default: 0.2)
    /// - `TOOLBOX_MAX_TOKENS`: Maximum tokens per reply (default: 4096)
    /// - `TOOLBOX_MAVEN_IMAGE`: Maven builder image (default: maven:3.9-eclipse-temurin-21)
    /// - `TOOLBOX_GO_IMAGE`: Go builder image (default: golang:1.23)
    /// - `TOOLBOX_BUILD_MEMORY_MB`: Build container memory in MB (default: 2048)
    /// - `TOOLBOX_BUILD_CPU_CORES`: Build container CPU cores (default: 2.0)
    /// - `TOOLBOX_PROMPTS`: YAML file overriding prompt templates (optional)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value or the prompt
    /// file cannot be loaded.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Agent settings
        if let Some(val) = lookup("TOOLBOX_MODEL") {
            config.model = val;
        }

        if let Some(val) = lookup("TOOLBOX_MAX_STEPS") {
            config.max_steps = parse_env_value(&val, "TOOLBOX_MAX_STEPS")?;
        }

        if let Some(val) = lookup("TOOLBOX_TEMPERATURE") {
            config.temperature = parse_env_value(&val, "TOOLBOX_TEMPERATURE")?;
        }

        if let Some(val) = lookup("TOOLBOX_MAX_TOKENS") {
            config.max_tokens = parse_env_value(&val, "TOOLBOX_MAX_TOKENS")?;
        }

        // Build settings
        if let Some(val) = lookup("TOOLBOX_MAVEN_IMAGE") {
            config.maven_image = val;
        }

        if let Some(val) = lookup("TOOLBOX_GO_IMAGE") {
            config.go_image = val;
        }

        if let Some(val) = lookup("TOOLBOX_BUILD_MEMORY_MB") {
            config.build_memory_mb = parse_env_value(&val, "TOOLBOX_BUILD_MEMORY_MB")?;
        }

        if let Some(val) = lookup("TOOLBOX_BUILD_CPU_CORES") {
            config.build_cpu_cores = parse_env_value(&val, "TOOLBOX_BUILD_CPU_CORES")?;
        }

        // Prompts
        if let Some(val) = lookup("TOOLBOX_PROMPTS") {
            if !val.trim().is_empty() {
                config.prompts = PromptSet::load(Path::new(val.trim()))?;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid, or
    /// `ConfigError::MissingPlaceholder` for an unusable prompt template.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "model cannot be empty".to_string(),
            ));
        }

        if self.max_steps == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_steps must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationFailed(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.maven_image.is_empty() || self.go_image.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "builder images cannot be empty".to_string(),
            ));
        }

        if self.build_memory_mb < 256 {
            return Err(ConfigError::ValidationFailed(
                "build_memory_mb must be at least 256 MB".to_string(),
            ));
        }

        if self.build_cpu_cores <= 0.0 {
            return Err(ConfigError::ValidationFailed(
                "build_cpu_cores must be greater than 0".to_string(),
            ));
        }

        self.prompts.validate()
    }

    /// Session settings derived from this configuration.
    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig::new()
            .with_model(self.model.clone())
            .with_max_steps(self.max_steps)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
    }

    /// Resource limits for build containers.
    pub fn limits(&self) -> ExecutionLimits {
        ExecutionLimits {
            memory_mb: self.build_memory_mb,
            cpu_cores: self.build_cpu_cores,
            ..ExecutionLimits::default()
        }
    }

    /// Builder method to set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Builder method to set max steps per session.
    pub fn with_max_steps(mut self, max: usize) -> Self {
        self.max_steps = max;
        self
    }

    /// Builder method to set temperature.
    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = temp;
        self
    }

    /// Builder method to set max tokens per reply.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    /// Builder method to set the Maven image.
    pub fn with_maven_image(mut self, image: impl Into<String>) -> Self {
        self.maven_image = image.into();
        self
    }

    /// Builder method to set the Go image.
    pub fn with_go_image(mut self, image: impl Into<String>) -> Self {
        self.go_image = image.into();
        self
    }

    /// Builder method to set the build container memory limit.
    pub fn with_build_memory_mb(mut self, memory: u64) -> Self {
        self.build_memory_mb = memory;
        self
    }

    /// Builder method to set the build container CPU cores.
    pub fn with_build_cpu_cores(mut self, cores: f64) -> Self {
        self.build_cpu_cores = cores;
        self
    }

    /// Builder method to set the prompt templates.
    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}
