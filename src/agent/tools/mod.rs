//! Tool definitions and registry for agent sessions.
//!
//! Tools are the only way an agent can observe or change anything. Each tool
//! runs against the [`SessionState`] of its session: workspace tools read or
//! replace the current workspace, build tools run a toolchain over its
//! snapshot.

pub mod build;
pub mod workspace;

pub use build::{BuildTarget, BuildTool};
pub use workspace::{
    CopyDirTool, ListDirTool, ReadFileTool, RmDirTool, RmTool, WalkTool, WriteFileTool,
};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::builder::{BuildAction, Builder};
use crate::workspace::Workspace;

/// Errors that can occur during tool execution.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Invalid parameters provided to the tool.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Tool execution failed.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Tool is not available in the current session.
    #[error("Tool not available: {0}")]
    NotAvailable(String),
}

/// Result of a tool execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool execution was successful.
    pub success: bool,
    /// Output from the tool execution.
    pub output: String,
    /// Error message if execution failed.
    pub error: Option<String>,
}

impl ToolResult {
    /// Create a successful tool result.
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    /// Create a failed tool result.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }

    /// Renders the result as an observation for the agent.
    pub fn observation(&self, tool: &str) -> String {
        if self.success {
            format!("Tool '{}' succeeded:\n{}", tool, self.output)
        } else {
            format!(
                "Tool '{}' failed:\n{}",
                tool,
                self.error.as_deref().unwrap_or("Unknown error")
            )
        }
    }
}

/// Mutable bindings of one agent session.
///
/// The session hands this to every tool call and returns its final value to
/// the caller once the agent stops calling tools.
#[derive(Clone)]
pub struct SessionState {
    /// The current workspace.
    pub workspace: Workspace,
    builders: Vec<Arc<dyn Builder>>,
}

impl SessionState {
    /// Creates a state with no extra builders.
    pub fn new(workspace: impl Into<Workspace>) -> Self {
        Self {
            workspace: workspace.into(),
            builders: Vec::new(),
        }
    }

    /// Makes `builder` available to the session.
    pub fn with_builder(mut self, builder: Arc<dyn Builder>) -> Self {
        self.builders.push(builder);
        self
    }

    /// Builders available to the session, in registration order.
    pub fn builders(&self) -> &[Arc<dyn Builder>] {
        &self.builders
    }

    /// Looks a builder up by name.
    pub fn builder(&self, name: &str) -> Option<&Arc<dyn Builder>> {
        self.builders.iter().find(|b| b.name() == name)
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.builders.iter().map(|b| b.name()).collect();
        f.debug_struct("SessionState")
            .field("workspace", &self.workspace)
            .field("builders", &names)
            .finish()
    }
}

/// Trait for tools that can be executed by the agent.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the unique name of the tool.
    fn name(&self) -> &str;

    /// Returns a description of what the tool does.
    fn description(&self) -> &str;

    /// Returns the JSON schema for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given arguments against the session state.
    ///
    /// Mutating tools replace `state.workspace` with the derived workspace.
    async fn execute(&self, args: Value, state: &mut SessionState)
        -> Result<ToolResult, ToolError>;
}

/// Deserializes tool arguments, mapping failures to `InvalidParameters`.
pub(crate) fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    // agents sometimes send null instead of {} for argument-less calls
    let args = if args.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| ToolError::InvalidParameters(e.to_string()))
}

/// Registry for the tools bound to a session.
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Read-only tools: `read_file`, `list_dir`, `walk`.
    pub fn reader() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ReadFileTool));
        registry.register(Arc::new(ListDirTool));
        registry.register(Arc::new(WalkTool));
        registry
    }

    /// Reader tools plus file mutators and `<name>_build`/`<name>_test` for
    /// every builder.
    pub fn editor(builders: &[Arc<dyn Builder>]) -> Self {
        let mut registry = Self::reader();
        registry.register(Arc::new(WriteFileTool));
        registry.register(Arc::new(CopyDirTool));
        registry.register(Arc::new(RmTool));
        registry.register(Arc::new(RmDirTool));
        for builder in builders {
            for action in [BuildAction::Build, BuildAction::Test] {
                registry.register(Arc::new(BuildTool::for_builder(builder.as_ref(), action)));
            }
        }
        registry
    }

    /// Adds `build`/`test` tools running the workspace's own toolchain.
    pub fn with_workspace_build(mut self) -> Self {
        for action in [BuildAction::Build, BuildAction::Test] {
            self.register(Arc::new(BuildTool::for_workspace(action)));
        }
        self
    }

    /// Register a new tool in the registry.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Registered tool names, sorted.
    pub fn list_tools(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Generate a JSON schema for all registered tools.
    ///
    /// Returns a JSON array of tool definitions in function-calling layout.
    pub fn to_json_schema(&self) -> Value {
        let tools: Vec<Value> = self
            .tools
            .values()
            .map(|tool| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool.parameters_schema()
                    }
                })
            })
            .collect();

        Value::Array(tools)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::test_support::ScriptedEngine;
    use crate::builder::{GoBuilder, MavenBuilder};
    use crate::snapshot::Snapshot;
    use crate::workspace::SimpleWorkspace;

    fn builders() -> Vec<Arc<dyn Builder>> {
        let engine = Arc::new(ScriptedEngine::new());
        let maven: Arc<dyn Builder> = Arc::new(MavenBuilder::new(engine.clone()));
        let go: Arc<dyn Builder> = Arc::new(GoBuilder::new(engine));
        vec![maven, go]
    }

    #[test]
    fn test_tool_result_observation() {
        assert_eq!(
            ToolResult::success("a\nb").observation("walk"),
            "Tool 'walk' succeeded:\na\nb"
        );
        assert_eq!(
            ToolResult::failure("no such file or directory: x").observation("read_file"),
            "Tool 'read_file' failed:\nno such file or directory: x"
        );
    }

    #[test]
    fn test_reader_registry_has_no_write_tools() {
        let registry = ToolRegistry::reader();
        assert_eq!(registry.list_tools(), vec!["list_dir", "read_file", "walk"]);
        assert!(registry.get("write_file").is_none());
        assert!(registry.get("rm").is_none());
    }

    #[test]
    fn test_editor_registry_adds_builder_tools() {
        let registry = ToolRegistry::editor(&builders());
        assert_eq!(
            registry.list_tools(),
            vec![
                "copy_dir",
                "go_build",
                "go_test",
                "list_dir",
                "maven_build",
                "maven_test",
                "read_file",
                "rm",
                "rm_dir",
                "walk",
                "write_file",
            ]
        );
    }

    #[test]
    fn test_workspace_build_tools() {
        let registry = ToolRegistry::editor(&[]).with_workspace_build();
        assert!(registry.get("build").is_some());
        assert!(registry.get("test").is_some());
        assert!(registry.get("maven_build").is_none());
    }

    #[test]
    fn test_to_json_schema() {
        let schema = ToolRegistry::reader().to_json_schema();
        let arr = schema.as_array().expect("schema should be an array");
        assert_eq!(arr.len(), 3);
        for tool in arr {
            assert_eq!(tool["type"], "function");
            assert!(tool["function"]["name"].is_string());
            assert!(tool["function"]["parameters"].is_object());
        }
    }

    #[test]
    fn test_session_state_builder_lookup() {
        let mut state = SessionState::new(SimpleWorkspace::new(Snapshot::empty()));
        for builder in builders() {
            state = state.with_builder(builder);
        }
        assert_eq!(state.builders().len(), 2);
        assert_eq!(state.builder("go").map(|b| b.name()), Some("go"));
        assert!(state.builder("gradle").is_none());
    }

    #[test]
    fn test_parse_args_accepts_null() {
        #[derive(Deserialize)]
        struct Args {
            path: Option<String>,
        }
        let args: Args = parse_args(Value::Null).unwrap();
        assert!(args.path.is_none());
        assert!(matches!(
            parse_args::<Args>(serde_json::json!({"path": 3})),
            Err(ToolError::InvalidParameters(_))
        ));
    }
}
