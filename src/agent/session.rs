//! Agent session loop.
//!
//! A session drives the LLM through multi-step tool calls:
//! 1. Send the tool protocol and the rendered prompt
//! 2. Get the LLM reply
//! 3. Parse one tool call out of it
//! 4. Execute the tool against the session state
//! 5. Send the observation back
//!
//! A reply without a tool call ends the session and becomes its last reply.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::tools::{SessionState, ToolRegistry, ToolResult};
use super::AgentError;
use crate::llm::{GenerationRequest, LlmProvider, Message};

/// Instructions sent ahead of every session, followed by the tool schema.
const TOOL_PROTOCOL: &str = r#"You work on a workspace exclusively through tools.

To call a tool, reply with a single JSON object and nothing else:

{"tool": "<tool name>", "arguments": {<arguments>}}

The result of each call is sent back to you. Call one tool per reply.
When the assignment is complete, reply with your final answer in markdown, without any tool call.

Tools:
"#;

/// Configuration for agent sessions.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum number of LLM replies in one session.
    pub max_steps: usize,
    /// Model to use; empty means the provider's default.
    pub model: String,
    /// Temperature for LLM sampling.
    pub temperature: f64,
    /// Maximum tokens for each LLM reply.
    pub max_tokens: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 50,
            model: String::new(),
            temperature: 0.2,
            max_tokens: 4096,
        }
    }
}

impl AgentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Which tools a session gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// `read_file`, `list_dir`, `walk`.
    Reader,
    /// Reader tools plus file mutators and build/test tools.
    Editor,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::Reader => write!(f, "reader"),
            SessionMode::Editor => write!(f, "editor"),
        }
    }
}

/// A tool call extracted from an LLM reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

/// Extracts tool calls from LLM replies.
pub trait ToolCallParser: Send + Sync {
    /// Returns the first tool call in `response`, if any.
    fn parse(&self, response: &str) -> Option<ToolCall>;
}

/// Parses `{"tool": ..., "arguments": {...}}` objects, bare or in a
/// ```` ```json ```` block.
///
/// Only objects with a string `tool` key count, so JSON the agent quotes
/// from the workspace (package.json, say) is not mistaken for a call.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonToolCallParser;

impl ToolCallParser for JsonToolCallParser {
    fn parse(&self, response: &str) -> Option<ToolCall> {
        self.parse_code_block_format(response)
            .or_else(|| self.parse_json_format(response))
    }
}

impl JsonToolCallParser {
    fn to_call(value: &Value) -> Option<ToolCall> {
        let name = value.get("tool")?.as_str()?;
        let arguments = value
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        Some(ToolCall {
            name: name.to_string(),
            arguments,
        })
    }

    /// Scans for top-level JSON objects, skipping braces inside strings.
    fn parse_json_format(&self, response: &str) -> Option<ToolCall> {
        let mut depth = 0usize;
        let mut start = None;
        let mut in_string = false;
        let mut escaped = false;

        for (i, c) in response.char_indices() {
            if in_string {
                match c {
                    _ if escaped => escaped = false,
                    '\\' => escaped = true,
                    '"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match c {
                '"' if depth > 0 => in_string = true,
                '{' => {
                    if depth == 0 {
                        start = Some(i);
                    }
                    depth += 1;
                }
                '}' if depth > 0 => {
                    depth -= 1;
                    if depth == 0 {
                        if let Some(s) = start.take() {
                            let candidate = &response[s..=i];
                            if let Some(call) = serde_json::from_str::<Value>(candidate)
                                .ok()
                                .as_ref()
                                .and_then(Self::to_call)
                            {
                                return Some(call);
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        None
    }

    /// Looks for ```` ```json ```` blocks holding a tool call.
    fn parse_code_block_format(&self, response: &str) -> Option<ToolCall> {
        const BLOCK_START: &str = "```json";
        const BLOCK_END: &str = "```";

        let mut rest = response;
        while let Some(start) = rest.find(BLOCK_START) {
            let body = &rest[start + BLOCK_START.len()..];
            let end = body.find(BLOCK_END)?;
            let call = serde_json::from_str::<Value>(body[..end].trim())
                .ok()
                .as_ref()
                .and_then(Self::to_call);
            if call.is_some() {
                return call;
            }
            rest = &body[end + BLOCK_END.len()..];
        }
        None
    }
}

/// What a completed session hands back.
#[derive(Debug)]
pub struct SessionOutcome {
    /// The reply that ended the session.
    pub last_reply: String,
    /// Final bindings, including the last workspace.
    pub state: SessionState,
    /// Number of LLM replies received.
    pub steps: usize,
}

/// Runs agent sessions against one LLM provider.
pub struct AgentSession {
    llm: Arc<dyn LlmProvider>,
    parser: Box<dyn ToolCallParser>,
    config: AgentConfig,
}

impl AgentSession {
    pub fn new(llm: Arc<dyn LlmProvider>, config: AgentConfig) -> Self {
        Self {
            llm,
            parser: Box::new(JsonToolCallParser),
            config,
        }
    }

    /// Set a custom tool call parser.
    pub fn with_parser(mut self, parser: Box<dyn ToolCallParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Tools bound for `mode` over `state`.
    pub fn registry_for(mode: SessionMode, state: &SessionState) -> ToolRegistry {
        match mode {
            SessionMode::Reader => ToolRegistry::reader(),
            SessionMode::Editor => {
                let registry = ToolRegistry::editor(state.builders());
                if state.workspace.can_build() {
                    registry.with_workspace_build()
                } else {
                    registry
                }
            }
        }
    }

    /// Runs one session until the agent replies without a tool call.
    ///
    /// # Errors
    ///
    /// LLM failures abort the session. Running out of steps is
    /// [`AgentError::StepLimitExceeded`]. Tool failures are not errors: they
    /// are reported to the agent as observations.
    pub async fn run(
        &self,
        mode: SessionMode,
        prompt: &str,
        mut state: SessionState,
    ) -> Result<SessionOutcome, AgentError> {
        let registry = Self::registry_for(mode, &state);
        let schema = serde_json::to_string_pretty(&registry.to_json_schema())?;

        let mut conversation = vec![
            Message::system(format!("{TOOL_PROTOCOL}{schema}")),
            Message::user(prompt),
        ];

        tracing::info!(
            mode = %mode,
            workspace = state.workspace.flavor(),
            tools = registry.len(),
            "Starting agent session"
        );

        for step in 0..self.config.max_steps {
            let request = GenerationRequest::new(self.config.model.clone(), conversation.clone())
                .with_temperature(self.config.temperature)
                .with_max_tokens(self.config.max_tokens);

            let response = self.llm.generate(request).await?;
            let reply = response
                .first_content()
                .ok_or_else(|| AgentError::ParseError("Empty LLM response".to_string()))?
                .to_string();
            conversation.push(Message::assistant(&reply));

            let Some(call) = self.parser.parse(&reply) else {
                tracing::info!(mode = %mode, steps = step + 1, "Agent session finished");
                return Ok(SessionOutcome {
                    last_reply: reply,
                    state,
                    steps: step + 1,
                });
            };

            let observation = match registry.get(&call.name) {
                Some(tool) => match tool.execute(call.arguments, &mut state).await {
                    Ok(result) => {
                        tracing::debug!(tool = %call.name, success = result.success, "Tool call");
                        result.observation(&call.name)
                    }
                    Err(e) => {
                        tracing::debug!(tool = %call.name, error = %e, "Tool call rejected");
                        format!("Tool '{}' error: {}", call.name, e)
                    }
                },
                None => {
                    tracing::debug!(tool = %call.name, "Unknown tool");
                    ToolResult::failure(format!(
                        "Tool '{}' not found. Available tools: {}",
                        call.name,
                        registry.list_tools().join(", ")
                    ))
                    .observation(&call.name)
                }
            };
            conversation.push(Message::user(observation));
        }

        tracing::warn!(max_steps = self.config.max_steps, "Agent session hit the step limit");
        Err(AgentError::StepLimitExceeded {
            max_steps: self.config.max_steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::test_support::ScriptedLlm;
    use crate::builder::test_support::ScriptedEngine;
    use crate::builder::GoBuilder;
    use crate::error::LlmError;
    use crate::snapshot::Snapshot;
    use crate::workspace::SimpleWorkspace;

    fn state() -> SessionState {
        SessionState::new(SimpleWorkspace::new(
            Snapshot::empty()
                .with_new_file("main.go", "package main\n\nfunc main() {}\n")
                .unwrap()
                .with_new_file("go.mod", "module example.com/hello\n")
                .unwrap(),
        ))
    }

    #[test]
    fn test_agent_config_builder() {
        let config = AgentConfig::new()
            .with_max_steps(10)
            .with_model("openai/gpt-4o")
            .with_temperature(0.5)
            .with_max_tokens(8192);

        assert_eq!(config.max_steps, 10);
        assert_eq!(config.model, "openai/gpt-4o");
        assert!((config.temperature - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.max_tokens, 8192);
        assert_eq!(AgentConfig::default().max_steps, 50);
    }

    #[test]
    fn test_parser_bare_json() {
        let call = JsonToolCallParser
            .parse(r#"Let me look: {"tool": "read_file", "arguments": {"path": "main.go"}}"#)
            .unwrap();
        assert_eq!(call.name, "read_file");
        assert_eq!(call.arguments["path"], "main.go");
    }

    #[test]
    fn test_parser_code_block() {
        let reply = "I will list the root.\n\n```json\n{\"tool\": \"list_dir\"}\n```\n";
        let call = JsonToolCallParser.parse(reply).unwrap();
        assert_eq!(call.name, "list_dir");
        assert!(call.arguments.as_object().unwrap().is_empty());
    }

    #[test]
    fn test_parser_braces_inside_strings() {
        let reply = r#"{"tool": "write_file", "arguments": {"path": "main.go", "content": "func main() {\n\tif x {\n}"}}"#;
        let call = JsonToolCallParser.parse(reply).unwrap();
        assert_eq!(call.name, "write_file");
        assert_eq!(call.arguments["content"], "func main() {\n\tif x {\n}");
    }

    #[test]
    fn test_parser_ignores_plain_json() {
        let reply = r#"The manifest is {"name": "demo", "version": "1.0.0"} and it looks fine."#;
        assert!(JsonToolCallParser.parse(reply).is_none());
        assert!(JsonToolCallParser.parse("No bugs found.").is_none());
    }

    #[test]
    fn test_parser_skips_non_tool_blocks() {
        let reply = "```json\n{\"name\": \"demo\"}\n```\nthen\n```json\n{\"tool\": \"walk\", \"arguments\": {\"pattern\": \"**/*.go\"}}\n```";
        let call = JsonToolCallParser.parse(reply).unwrap();
        assert_eq!(call.name, "walk");
    }

    #[tokio::test]
    async fn test_reply_without_tool_call_ends_session() {
        let llm = Arc::new(ScriptedLlm::new(["# Summary\nIt prints nothing."]));
        let session = AgentSession::new(llm.clone(), AgentConfig::default());

        let outcome = session
            .run(SessionMode::Reader, "explain", state())
            .await
            .unwrap();

        assert_eq!(outcome.last_reply, "# Summary\nIt prints nothing.");
        assert_eq!(outcome.steps, 1);

        let requests = llm.requests();
        assert_eq!(requests[0].messages[0].role, "system");
        assert!(requests[0].messages[0].content.contains("read_file"));
        assert_eq!(requests[0].messages[1].content, "explain");
    }

    #[tokio::test]
    async fn test_tool_results_are_fed_back() {
        let llm = Arc::new(ScriptedLlm::new([
            r#"{"tool": "read_file", "arguments": {"path": "main.go"}}"#,
            "It is an empty Go program.",
        ]));
        let session = AgentSession::new(llm.clone(), AgentConfig::default());

        let outcome = session
            .run(SessionMode::Reader, "explain", state())
            .await
            .unwrap();

        assert_eq!(outcome.steps, 2);
        let second = &llm.requests()[1];
        let observation = &second.messages.last().unwrap().content;
        assert!(observation.starts_with("Tool 'read_file' succeeded"));
        assert!(observation.contains("func main() {}"));
    }

    #[tokio::test]
    async fn test_reader_cannot_write() {
        let llm = Arc::new(ScriptedLlm::new([
            r#"{"tool": "write_file", "arguments": {"path": "main.go", "content": ""}}"#,
            "I could not write.",
        ]));
        let session = AgentSession::new(llm.clone(), AgentConfig::default());
        let before = state();

        let outcome = session
            .run(SessionMode::Reader, "explain", before.clone())
            .await
            .unwrap();

        assert_eq!(outcome.state.workspace.dir(), before.workspace.dir());
        let requests = llm.requests();
        let observation = &requests[1].messages.last().unwrap().content;
        assert!(observation.contains("not found"));
    }

    #[tokio::test]
    async fn test_editor_writes_are_kept() {
        let llm = Arc::new(ScriptedLlm::new([
            r#"{"tool": "write_file", "arguments": {"path": "README.md", "content": "hello"}}"#,
            "Done.",
        ]));
        let session = AgentSession::new(llm, AgentConfig::default());

        let outcome = session
            .run(SessionMode::Editor, "add a readme", state())
            .await
            .unwrap();

        assert_eq!(outcome.state.workspace.read("README.md").unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_build_failure_is_reported_and_session_continues() {
        let engine = Arc::new(ScriptedEngine::new().exit(1, "./main.go:3:1: undefined: x"));
        let state = state().with_builder(Arc::new(GoBuilder::new(engine)));
        let llm = Arc::new(ScriptedLlm::new([
            r#"{"tool": "go_build"}"#,
            r#"{"tool": "write_file", "arguments": {"path": "main.go", "content": "package main\n"}}"#,
            "Fixed the build.",
        ]));
        let session = AgentSession::new(llm.clone(), AgentConfig::default());

        let outcome = session.run(SessionMode::Editor, "fix", state).await.unwrap();

        assert_eq!(outcome.steps, 3);
        assert_eq!(outcome.last_reply, "Fixed the build.");
        let requests = llm.requests();
        let observation = &requests[1].messages.last().unwrap().content;
        assert!(observation.contains("undefined: x"));
    }

    #[tokio::test]
    async fn test_invalid_arguments_are_observations() {
        let llm = Arc::new(ScriptedLlm::new([
            r#"{"tool": "read_file", "arguments": {"file": "main.go"}}"#,
            "ok",
        ]));
        let session = AgentSession::new(llm.clone(), AgentConfig::default());

        session.run(SessionMode::Reader, "explain", state()).await.unwrap();

        let requests = llm.requests();
        let observation = &requests[1].messages.last().unwrap().content;
        assert!(observation.starts_with("Tool 'read_file' error: Invalid parameters"));
    }

    #[tokio::test]
    async fn test_step_limit() {
        let llm = Arc::new(ScriptedLlm::new([r#"{"tool": "list_dir"}"#; 5]));
        let session = AgentSession::new(llm, AgentConfig::default().with_max_steps(3));

        let err = session
            .run(SessionMode::Reader, "explain", state())
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::StepLimitExceeded { max_steps: 3 }));
    }

    #[tokio::test]
    async fn test_llm_error_aborts() {
        let llm = Arc::new(ScriptedLlm::new(Vec::<&str>::new()));
        let session = AgentSession::new(llm, AgentConfig::default());

        let err = session
            .run(SessionMode::Reader, "explain", state())
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::Llm(LlmError::RequestFailed(_))));
    }
}
