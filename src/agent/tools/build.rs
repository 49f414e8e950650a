//! Build and test tools.
//!
//! A failed build is a successful tool call from the session's point of view:
//! the compiler output is returned to the agent so it can fix the code.

use async_trait::async_trait;
use serde_json::Value;

use super::{SessionState, Tool, ToolError, ToolResult};
use crate::builder::{BuildAction, Builder};
use crate::error::BuildError;

/// What a [`BuildTool`] runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildTarget {
    /// A named builder from the session state.
    Builder(String),
    /// The workspace's own toolchain (Java workspaces).
    Workspace,
}

/// Runs a build or test over the current workspace snapshot.
pub struct BuildTool {
    name: String,
    description: String,
    target: BuildTarget,
    action: BuildAction,
}

impl BuildTool {
    /// `<builder>_build` / `<builder>_test`.
    pub fn for_builder(builder: &dyn Builder, action: BuildAction) -> Self {
        Self {
            name: format!("{}_{}", builder.name(), action),
            description: format!(
                "Run the {} {} over the current workspace: {}. Returns the error output if it fails.",
                builder.name(),
                action,
                builder.description()
            ),
            target: BuildTarget::Builder(builder.name().to_string()),
            action,
        }
    }

    /// `build` / `test` using the workspace's own toolchain.
    pub fn for_workspace(action: BuildAction) -> Self {
        Self {
            name: action.to_string(),
            description: format!(
                "Run the Maven {action} over the current workspace. Returns the error output if it fails."
            ),
            target: BuildTarget::Workspace,
            action,
        }
    }

    pub fn target(&self) -> &BuildTarget {
        &self.target
    }

    async fn run(&self, state: &SessionState) -> Result<(), BuildError> {
        match &self.target {
            BuildTarget::Workspace => match self.action {
                BuildAction::Build => state.workspace.build().await,
                BuildAction::Test => state.workspace.test().await,
            },
            BuildTarget::Builder(name) => {
                let builder = state
                    .builder(name)
                    .ok_or_else(|| BuildError::Unsupported(format!("no builder named '{name}'")))?;
                builder.run(self.action, state.workspace.dir()).await
            }
        }
    }
}

#[async_trait]
impl Tool for BuildTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(
        &self,
        _args: Value,
        state: &mut SessionState,
    ) -> Result<ToolResult, ToolError> {
        match self.run(state).await {
            Ok(()) => Ok(ToolResult::success(format!("{} succeeded", self.action))),
            Err(BuildError::Unsupported(message)) => Err(ToolError::NotAvailable(message)),
            Err(e @ (BuildError::BuildFailure { .. } | BuildError::TestFailure { .. })) => {
                Ok(ToolResult::failure(format!("{} failed:\n{}", self.action, e)))
            }
            Err(BuildError::Engine(e)) => Err(ToolError::ExecutionFailed(e.to_string())),
        }
    }
}
