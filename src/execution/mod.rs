//! Docker execution layer for builds.
//!
//! This module provides the container engine the builders run on, using the
//! bollard crate for container lifecycle management and resource control.
//!
//! # Architecture
//!
//! Each run uses a fresh container:
//! ```text
//! CREATE → UPLOAD SNAPSHOT → START → EXEC COMMAND → REMOVE
//! ```
//!
//! # Example
//!
//! ```ignore
//! use toolbox::execution::{ContainerEngine, DockerEngine, RunSpec};
//!
//! let engine = DockerEngine::connect()?;
//! let spec = RunSpec::new("golang:1.23", ["go", "build", "./..."]);
//! let result = engine.run(&spec, &snapshot).await?;
//! println!("exit code {}", result.exit_code);
//! ```

pub mod archive;
pub mod container;
pub mod docker_client;
pub mod engine;
pub mod resources;

pub use container::{ContainerStatus, EphemeralContainer};
pub use docker_client::{ContainerConfig, DockerClient, ExecResult};
pub use engine::{ContainerEngine, DockerEngine, RunSpec, DEFAULT_WORKING_DIR};
pub use resources::ExecutionLimits;
