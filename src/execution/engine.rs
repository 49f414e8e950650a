//! Container engine seam used by the builders.
//!
//! A [`ContainerEngine`] takes a snapshot and a command line and returns the
//! exit code and captured output. [`DockerEngine`] is the real implementation;
//! tests substitute scripted engines.

use async_trait::async_trait;

use super::archive::snapshot_to_tar;
use super::container::EphemeralContainer;
use super::docker_client::{ContainerConfig, DockerClient, ExecResult};
use super::resources::ExecutionLimits;
use crate::error::DockerError;
use crate::snapshot::Snapshot;

/// Default directory the snapshot is mounted at inside the container.
pub const DEFAULT_WORKING_DIR: &str = "/src";

/// What to run, and where.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSpec {
    /// Image providing the toolchain.
    pub image: String,
    /// Command line, e.g. `["mvn", "package"]`.
    pub command: Vec<String>,
    /// Directory the snapshot is placed in and the command runs from.
    pub working_dir: String,
    /// Extra environment (`KEY=value`).
    pub env: Vec<String>,
    /// Resource limits for the container.
    pub limits: ExecutionLimits,
}

impl RunSpec {
    /// Creates a spec running `command` in `image` from [`DEFAULT_WORKING_DIR`].
    pub fn new<I, S>(image: impl Into<String>, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            image: image.into(),
            command: command.into_iter().map(Into::into).collect(),
            working_dir: DEFAULT_WORKING_DIR.to_string(),
            env: Vec::new(),
            limits: ExecutionLimits::default(),
        }
    }

    /// Sets the working directory.
    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Sets the environment.
    pub fn with_env(mut self, env: Vec<String>) -> Self {
        self.env = env;
        self
    }

    /// Sets the resource limits.
    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// The command as a single display string.
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

/// Runs a command over a snapshot in an isolated container.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Runs `spec.command` in a fresh container seeded with `snapshot`.
    ///
    /// Returns the exit code and captured streams; a non-zero exit is not an
    /// error at this level.
    async fn run(&self, spec: &RunSpec, snapshot: &Snapshot) -> Result<ExecResult, DockerError>;
}

/// [`ContainerEngine`] backed by the local Docker daemon.
pub struct DockerEngine {
    client: DockerClient,
}

impl DockerEngine {
    /// Connects to the local Docker daemon.
    pub fn connect() -> Result<Self, DockerError> {
        Ok(Self {
            client: DockerClient::new()?,
        })
    }

    async fn run_in(
        &self,
        container: &mut EphemeralContainer,
        spec: &RunSpec,
        snapshot: &Snapshot,
    ) -> Result<ExecResult, DockerError> {
        // upload the tree relative to "/" so the working dir need not exist yet
        let archive = snapshot_to_tar(snapshot, &spec.working_dir)?;
        container.upload(&self.client, "/", archive).await?;
        container.start(&self.client).await?;

        let command: Vec<&str> = spec.command.iter().map(String::as_str).collect();
        container.exec(&self.client, &command).await
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn run(&self, spec: &RunSpec, snapshot: &Snapshot) -> Result<ExecResult, DockerError> {
        let config = ContainerConfig::for_run(EphemeralContainer::unique_name("toolbox"), spec);

        let mut container = EphemeralContainer::create(&self.client, &config).await?;
        tracing::debug!(id = container.id(), image = %spec.image, "Created build container");

        let result = self.run_in(&mut container, spec, snapshot).await;

        if let Err(e) = container.cleanup(&self.client).await {
            tracing::warn!(id = container.id(), error = %e, "Failed to remove build container");
        }

        let result = result?;
        tracing::info!(
            image = %spec.image,
            command = %spec.command_line(),
            exit_code = result.exit_code,
            "Container command finished"
        );
        Ok(result)
    }
}
