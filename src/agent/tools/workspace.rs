//! Workspace tools: read, list, walk, write, copy and remove files.
//!
//! Workspace failures such as a missing file are returned as failed
//! [`ToolResult`]s so the agent sees them as observations and can recover.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{parse_args, SessionState, Tool, ToolError, ToolResult};
use crate::error::WorkspaceError;
use crate::workspace::{Workspace, DEFAULT_WALK_PATTERN, ROOT};

/// Maximum file size returned by `read_file` (1MB).
const MAX_READ_SIZE: usize = 1_048_576;

fn path_schema(description: &str) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "path": {
                "type": "string",
                "description": description
            }
        },
        "required": ["path"]
    })
}

/// Replaces the session workspace with `derived`, or reports the failure.
fn apply(
    state: &mut SessionState,
    derived: Result<Workspace, WorkspaceError>,
    message: String,
) -> ToolResult {
    match derived {
        Ok(workspace) => {
            state.workspace = workspace;
            ToolResult::success(message)
        }
        Err(e) => ToolResult::failure(e.to_string()),
    }
}

fn lines_or(items: Vec<String>, empty: &str) -> String {
    if items.is_empty() {
        empty.to_string()
    } else {
        items.join("\n")
    }
}

#[derive(Debug, Deserialize)]
struct PathParams {
    path: String,
}

#[derive(Debug, Deserialize)]
struct OptionalPathParams {
    path: Option<String>,
}

// ============================================================================
// Reader tools
// ============================================================================

/// Reads a file from the workspace.
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file in the workspace."
    }

    fn parameters_schema(&self) -> Value {
        path_schema("Path of the file, relative to the workspace root")
    }

    async fn execute(
        &self,
        args: Value,
        state: &mut SessionState,
    ) -> Result<ToolResult, ToolError> {
        let params: PathParams = parse_args(args)?;

        Ok(match state.workspace.read(&params.path) {
            Ok(content) if content.len() > MAX_READ_SIZE => ToolResult::failure(format!(
                "File size ({} bytes) exceeds maximum allowed ({} bytes)",
                content.len(),
                MAX_READ_SIZE
            )),
            Ok(content) => ToolResult::success(content),
            Err(e) => ToolResult::failure(e.to_string()),
        })
    }
}

/// Lists the entries directly under a directory.
pub struct ListDirTool;

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List the names of the files and directories directly inside a directory. Defaults to the workspace root."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list (default: \"/\")"
                }
            }
        })
    }

    async fn execute(
        &self,
        args: Value,
        state: &mut SessionState,
    ) -> Result<ToolResult, ToolError> {
        let params: OptionalPathParams = parse_args(args)?;
        let path = params.path.as_deref().unwrap_or(ROOT);

        Ok(match state.workspace.list_dir(path) {
            Ok(entries) => ToolResult::success(lines_or(entries, "(empty directory)")),
            Err(e) => ToolResult::failure(e.to_string()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct WalkParams {
    pattern: Option<String>,
}

/// Lists every file matching a glob pattern.
pub struct WalkTool;

#[async_trait]
impl Tool for WalkTool {
    fn name(&self) -> &str {
        "walk"
    }

    fn description(&self) -> &str {
        "List all files in the workspace matching a glob pattern. `**` matches any number of directories, `*` matches within one path segment. Defaults to every file."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern, e.g. \"**/*.go\" (default: \"**\")"
                }
            }
        })
    }

    async fn execute(
        &self,
        args: Value,
        state: &mut SessionState,
    ) -> Result<ToolResult, ToolError> {
        let params: WalkParams = parse_args(args)?;
        let pattern = params.pattern.as_deref().unwrap_or(DEFAULT_WALK_PATTERN);

        Ok(match state.workspace.walk(pattern) {
            Ok(files) => ToolResult::success(lines_or(files, "(no matching files)")),
            Err(e) => ToolResult::failure(e.to_string()),
        })
    }
}

// ============================================================================
// Editor tools
// ============================================================================

#[derive(Debug, Deserialize)]
struct WriteFileParams {
    path: String,
    content: String,
}

/// Creates or overwrites a file.
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Create or overwrite a file with the given content. Parent directories are created automatically."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path of the file, relative to the workspace root"
                },
                "content": {
                    "type": "string",
                    "description": "Complete new content of the file"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(
        &self,
        args: Value,
        state: &mut SessionState,
    ) -> Result<ToolResult, ToolError> {
        let params: WriteFileParams = parse_args(args)?;
        if params.path.trim().is_empty() {
            return Err(ToolError::InvalidParameters(
                "Path cannot be empty".to_string(),
            ));
        }

        let derived = state.workspace.write(&params.path, &params.content);
        let message = format!("Wrote {} bytes to {}", params.content.len(), params.path);
        Ok(apply(state, derived, message))
    }
}

#[derive(Debug, Deserialize)]
struct CopyDirParams {
    path: String,
    source: String,
}

/// Copies a directory of the workspace to another location.
pub struct CopyDirTool;

#[async_trait]
impl Tool for CopyDirTool {
    fn name(&self) -> &str {
        "copy_dir"
    }

    fn description(&self) -> &str {
        "Copy the directory `source` to `path`. Files already under `path` are overwritten one by one; files not present in `source` are kept."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Destination directory"
                },
                "source": {
                    "type": "string",
                    "description": "Directory to copy from"
                }
            },
            "required": ["path", "source"]
        })
    }

    async fn execute(
        &self,
        args: Value,
        state: &mut SessionState,
    ) -> Result<ToolResult, ToolError> {
        let params: CopyDirParams = parse_args(args)?;

        let source = match state.workspace.dir().subdirectory(&params.source) {
            Ok(source) => source,
            Err(e) => return Ok(ToolResult::failure(e.to_string())),
        };
        let derived = state.workspace.copy_dir(&params.path, &source);
        let message = format!(
            "Copied {} files from {} to {}",
            source.files().count(),
            params.source,
            params.path
        );
        Ok(apply(state, derived, message))
    }
}

/// Removes a file.
pub struct RmTool;

#[async_trait]
impl Tool for RmTool {
    fn name(&self) -> &str {
        "rm"
    }

    fn description(&self) -> &str {
        "Remove a file. Removing a file that does not exist does nothing."
    }

    fn parameters_schema(&self) -> Value {
        path_schema("Path of the file to remove")
    }

    async fn execute(
        &self,
        args: Value,
        state: &mut SessionState,
    ) -> Result<ToolResult, ToolError> {
        let params: PathParams = parse_args(args)?;
        let derived = state.workspace.rm(&params.path);
        Ok(apply(state, derived, format!("Removed {}", params.path)))
    }
}

/// Removes a directory and everything below it.
pub struct RmDirTool;

#[async_trait]
impl Tool for RmDirTool {
    fn name(&self) -> &str {
        "rm_dir"
    }

    fn description(&self) -> &str {
        "Remove a directory and everything inside it."
    }

    fn parameters_schema(&self) -> Value {
        path_schema("Path of the directory to remove")
    }

    async fn execute(
        &self,
        args: Value,
        state: &mut SessionState,
    ) -> Result<ToolResult, ToolError> {
        let params: PathParams = parse_args(args)?;
        let derived = state.workspace.rm_dir(&params.path);
        Ok(apply(state, derived, format!("Removed directory {}", params.path)))
    }
}
