//! Thin bollard wrapper covering the calls a build container needs.

use bollard::container::{
    Config, CreateContainerOptions, LogOutput, RemoveContainerOptions, StartContainerOptions,
    UploadToContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use bollard::Docker;
use futures::StreamExt;

use crate::error::DockerError;
use crate::execution::engine::RunSpec;
use crate::execution::resources::ExecutionLimits;

/// Keeps a build container alive between `start` and `exec`.
const KEEP_ALIVE_CMD: [&str; 2] = ["sleep", "infinity"];

/// Builds resolve dependencies from remote registries.
const BUILD_NETWORK: &str = "bridge";

/// How a build container is created.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerConfig {
    pub name: String,
    pub image: String,
    pub working_dir: String,
    /// `KEY=value` pairs.
    pub env: Vec<String>,
    pub limits: ExecutionLimits,
}

impl ContainerConfig {
    /// Container settings for running `spec`.
    pub fn for_run(name: impl Into<String>, spec: &RunSpec) -> Self {
        Self {
            name: name.into(),
            image: spec.image.clone(),
            working_dir: spec.working_dir.clone(),
            env: spec.env.clone(),
            limits: spec.limits.clone(),
        }
    }

    /// The bollard create request. The container idles until removed and
    /// commands reach it through [`DockerClient::exec_command`].
    fn to_create_config(&self) -> Config<String> {
        let host_config = HostConfig {
            memory: Some(self.limits.memory_bytes()),
            cpu_period: Some(self.limits.cpu_period()),
            cpu_quota: Some(self.limits.cpu_quota()),
            pids_limit: Some(self.limits.max_processes as i64),
            network_mode: Some(BUILD_NETWORK.to_string()),
            ..Default::default()
        };

        Config {
            image: Some(self.image.clone()),
            cmd: Some(KEEP_ALIVE_CMD.iter().map(|s| s.to_string()).collect()),
            env: (!self.env.is_empty()).then(|| self.env.clone()),
            working_dir: Some(self.working_dir.clone()),
            host_config: Some(host_config),
            // separate stdout and stderr streams need tty off
            tty: Some(false),
            attach_stdin: Some(false),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        }
    }
}

/// Exit code and captured streams of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    fn append(&mut self, chunk: LogOutput) {
        match chunk {
            LogOutput::StdOut { message } => {
                self.stdout.push_str(&String::from_utf8_lossy(&message))
            }
            LogOutput::StdErr { message } => {
                self.stderr.push_str(&String::from_utf8_lossy(&message))
            }
            _ => {}
        }
    }
}

fn run_failed(step: &'static str) -> impl FnOnce(bollard::errors::Error) -> DockerError {
    move |e| DockerError::RunFailed(format!("{step}: {e}"))
}

/// Connection to the Docker daemon.
pub struct DockerClient {
    docker: Docker,
}

impl DockerClient {
    /// Connects to the local daemon (socket or `DOCKER_HOST`).
    pub fn new() -> Result<Self, DockerError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| DockerError::DaemonUnavailable(format!("Failed to connect: {e}")))?;
        Ok(Self { docker })
    }

    /// Pulls `image` unless it is already present locally.
    pub async fn ensure_image(&self, image: &str) -> Result<(), DockerError> {
        if self.docker.inspect_image(image).await.is_ok() {
            return Ok(());
        }

        tracing::info!(image, "Pulling image");
        let options = CreateImageOptions {
            from_image: image,
            ..Default::default()
        };
        let mut progress = self.docker.create_image(Some(options), None, None);
        while let Some(step) = progress.next().await {
            step.map_err(|e| DockerError::PullFailed {
                image: image.to_string(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Creates a container and returns its ID.
    pub async fn create_container(&self, config: &ContainerConfig) -> Result<String, DockerError> {
        let options = CreateContainerOptions {
            name: config.name.clone(),
            platform: None,
        };
        let response = self
            .docker
            .create_container(Some(options), config.to_create_config())
            .await
            .map_err(run_failed("Failed to create container"))?;
        Ok(response.id)
    }

    /// Extracts a tar archive into the container at `path`.
    pub async fn upload_archive(
        &self,
        id: &str,
        path: &str,
        archive: Vec<u8>,
    ) -> Result<(), DockerError> {
        let options = UploadToContainerOptions {
            path: path.to_string(),
            ..Default::default()
        };
        self.docker
            .upload_to_container(id, Some(options), archive.into())
            .await
            .map_err(|e| DockerError::CopyFailed(e.to_string()))
    }

    pub async fn start_container(&self, id: &str) -> Result<(), DockerError> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(run_failed("Failed to start container"))
    }

    /// Kills and removes the container along with its anonymous volumes.
    pub async fn remove_container(&self, id: &str) -> Result<(), DockerError> {
        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };
        self.docker
            .remove_container(id, Some(options))
            .await
            .map_err(run_failed("Failed to remove container"))
    }

    /// Runs `cmd` in a running container and waits for it to exit.
    ///
    /// A missing exit code from the daemon is reported as `-1`.
    pub async fn exec_command(
        &self,
        id: &str,
        cmd: &[&str],
        working_dir: &str,
    ) -> Result<ExecResult, DockerError> {
        let options = CreateExecOptions {
            cmd: Some(cmd.to_vec()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(false),
            working_dir: Some(working_dir),
            ..Default::default()
        };
        let exec = self
            .docker
            .create_exec(id, options)
            .await
            .map_err(run_failed("Failed to create exec"))?;

        let mut result = ExecResult {
            exit_code: -1,
            stdout: String::new(),
            stderr: String::new(),
        };

        let started = self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(run_failed("Failed to start exec"))?;
        if let StartExecResults::Attached { mut output, .. } = started {
            while let Some(chunk) = output.next().await {
                result.append(chunk.map_err(run_failed("Error reading output"))?);
            }
        }

        let inspected = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .map_err(run_failed("Failed to inspect exec"))?;
        if let Some(code) = inspected.exit_code {
            result.exit_code = code;
        }
        Ok(result)
    }
}
