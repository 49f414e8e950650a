//! Lifecycle of a single-use build container.
//!
//! A build container is created, seeded with a snapshot, started, used for
//! exactly one command and then removed. Nothing is shared between runs.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::DockerError;
use crate::execution::docker_client::{ContainerConfig, DockerClient, ExecResult};

/// Counter keeping container names unique within the process.
static CONTAINER_SEQ: AtomicU64 = AtomicU64::new(0);

/// Status of an ephemeral container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerStatus {
    /// Container exists but has not been started.
    Created,
    /// Container is running.
    Running,
    /// Container has been removed.
    Removed,
    /// A lifecycle step failed.
    Failed(String),
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerStatus::Created => write!(f, "created"),
            ContainerStatus::Running => write!(f, "running"),
            ContainerStatus::Removed => write!(f, "removed"),
            ContainerStatus::Failed(msg) => write!(f, "failed: {}", msg),
        }
    }
}

/// A container that lives for one command.
#[derive(Debug)]
pub struct EphemeralContainer {
    id: String,
    status: ContainerStatus,
    working_dir: String,
}

impl EphemeralContainer {
    /// Generates a process-unique container name.
    pub fn unique_name(prefix: &str) -> String {
        let seq = CONTAINER_SEQ.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}-{}-{seq}", std::process::id())
    }

    /// Creates the container, pulling the image first if it is missing.
    pub async fn create(client: &DockerClient, config: &ContainerConfig) -> Result<Self, DockerError> {
        client.ensure_image(&config.image).await?;
        let id = client.create_container(config).await?;

        Ok(Self {
            id,
            status: ContainerStatus::Created,
            working_dir: config.working_dir.clone(),
        })
    }

    /// Container ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current status.
    pub fn status(&self) -> &ContainerStatus {
        &self.status
    }

    /// Uploads a tar archive, extracting it at `path`.
    pub async fn upload(
        &mut self,
        client: &DockerClient,
        path: &str,
        archive: Vec<u8>,
    ) -> Result<(), DockerError> {
        client
            .upload_archive(&self.id, path, archive)
            .await
            .inspect_err(|e| self.status = ContainerStatus::Failed(format!("Upload failed: {e}")))
    }

    /// Starts the container.
    ///
    /// # Errors
    ///
    /// Returns `DockerError` if the container is not in `Created` status or
    /// the Docker API call fails.
    pub async fn start(&mut self, client: &DockerClient) -> Result<(), DockerError> {
        if self.status != ContainerStatus::Created {
            return Err(DockerError::RunFailed(format!(
                "Cannot start container in {} state",
                self.status
            )));
        }

        match client.start_container(&self.id).await {
            Ok(()) => {
                self.status = ContainerStatus::Running;
                Ok(())
            }
            Err(e) => {
                self.status = ContainerStatus::Failed(format!("Start failed: {}", e));
                Err(e)
            }
        }
    }

    /// Executes a command in the running container's working directory.
    pub async fn exec(&self, client: &DockerClient, cmd: &[&str]) -> Result<ExecResult, DockerError> {
        if self.status != ContainerStatus::Running {
            return Err(DockerError::RunFailed(format!(
                "Cannot exec in container in {} state",
                self.status
            )));
        }

        client
            .exec_command(&self.id, cmd, &self.working_dir)
            .await
    }

    /// Force-removes the container.
    pub async fn cleanup(&mut self, client: &DockerClient) -> Result<(), DockerError> {
        if self.status == ContainerStatus::Removed {
            return Ok(());
        }
        client.remove_container(&self.id).await?;
        self.status = ContainerStatus::Removed;
        Ok(())
    }
}
