//! toolbox: LLM agents that read, explain and edit source trees.
//!
//! This library provides immutable workspace snapshots, containerized Maven
//! and Go builders, and agent sessions that drive an LLM through workspace
//! and build tools.

// Core modules
pub mod agent;
pub mod builder;
pub mod cli;
pub mod config;
pub mod error;
pub mod execution;
pub mod llm;
pub mod render;
pub mod snapshot;
pub mod toolbox;
pub mod workspace;

// Re-export commonly used types
pub use config::ToolboxConfig;
pub use error::{BuildError, ConfigError, DockerError, LlmError, ToolboxError, WorkspaceError};
pub use snapshot::Snapshot;
pub use toolbox::{Toolbox, WorkspaceFlavor};
