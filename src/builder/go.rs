//! Go builder.

use std::sync::Arc;

use async_trait::async_trait;

use super::{run_toolchain, BuildAction, Builder};
use crate::error::BuildError;
use crate::execution::{ContainerEngine, ExecutionLimits, RunSpec};
use crate::snapshot::Snapshot;

/// Default image for Go builds.
pub const DEFAULT_GO_IMAGE: &str = "golang:1.23";

/// Builds and tests Go modules with the `go` tool.
pub struct GoBuilder {
    engine: Arc<dyn ContainerEngine>,
    image: String,
    limits: ExecutionLimits,
}

impl GoBuilder {
    /// Creates a builder using [`DEFAULT_GO_IMAGE`].
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self {
            engine,
            image: DEFAULT_GO_IMAGE.to_string(),
            limits: ExecutionLimits::default(),
        }
    }

    /// Overrides the toolchain image.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// Overrides container resource limits.
    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Image used for builds.
    pub fn image(&self) -> &str {
        &self.image
    }

    fn spec(&self, action: BuildAction) -> RunSpec {
        RunSpec::new(&self.image, ["go".to_string(), action.to_string(), "./...".to_string()])
            .with_limits(self.limits.clone())
    }
}

#[async_trait]
impl Builder for GoBuilder {
    fn name(&self) -> &str {
        "go"
    }

    fn description(&self) -> &str {
        "Go modules built with the go toolchain (go.mod)"
    }

    async fn build(&self, snapshot: &Snapshot) -> Result<(), BuildError> {
        let spec = self.spec(BuildAction::Build);
        run_toolchain(self.engine.as_ref(), &spec, BuildAction::Build, snapshot).await
    }

    async fn test(&self, snapshot: &Snapshot) -> Result<(), BuildError> {
        let spec = self.spec(BuildAction::Test);
        run_toolchain(self.engine.as_ref(), &spec, BuildAction::Test, snapshot).await
    }
}
