//! Containerized builders.
//!
//! A [`Builder`] compiles or tests a snapshot inside an isolated container.
//! Success is exit code zero with no diagnostic; any other code is a failure
//! carrying the command's stderr verbatim. There are no retries: each call is
//! one container run.

pub mod go;
pub mod maven;

pub use go::{GoBuilder, DEFAULT_GO_IMAGE};
pub use maven::{MavenBuilder, DEFAULT_MAVEN_IMAGE};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::BuildError;
use crate::execution::{ContainerEngine, RunSpec};
use crate::snapshot::Snapshot;

/// The two things a builder can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildAction {
    Build,
    Test,
}

impl fmt::Display for BuildAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildAction::Build => write!(f, "build"),
            BuildAction::Test => write!(f, "test"),
        }
    }
}

/// Compiles and tests snapshots.
#[async_trait]
pub trait Builder: Send + Sync {
    /// Short identifier, e.g. `maven` or `go`.
    fn name(&self) -> &str;

    /// Human-readable description of the toolchain.
    fn description(&self) -> &str;

    /// Builds the project in `snapshot`.
    async fn build(&self, snapshot: &Snapshot) -> Result<(), BuildError>;

    /// Runs the project's tests in `snapshot`.
    async fn test(&self, snapshot: &Snapshot) -> Result<(), BuildError>;

    /// Runs `action` on `snapshot`.
    async fn run(&self, action: BuildAction, snapshot: &Snapshot) -> Result<(), BuildError> {
        match action {
            BuildAction::Build => self.build(snapshot).await,
            BuildAction::Test => self.test(snapshot).await,
        }
    }
}

/// Runs one toolchain command and maps its exit status.
///
/// Exit code zero is `Ok(())`; anything else becomes `BuildFailure` or
/// `TestFailure` (per `action`). The diagnostic is stderr verbatim, or stdout
/// when stderr is blank: Maven and `go test` report failures on stdout.
/// Engine errors pass through as `BuildError::Engine`.
pub(crate) async fn run_toolchain(
    engine: &dyn ContainerEngine,
    spec: &RunSpec,
    action: BuildAction,
    snapshot: &Snapshot,
) -> Result<(), BuildError> {
    let result = engine.run(spec, snapshot).await?;
    if result.success() {
        return Ok(());
    }

    tracing::debug!(
        command = %spec.command_line(),
        exit_code = result.exit_code,
        "Toolchain command failed"
    );
    let stderr = if result.stderr.trim().is_empty() {
        result.stdout
    } else {
        result.stderr
    };
    Err(match action {
        BuildAction::Build => BuildError::BuildFailure { stderr },
        BuildAction::Test => BuildError::TestFailure { stderr },
    })
}
