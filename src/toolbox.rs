//! The toolbox facade.
//!
//! Each operation renders a prompt, starts an agent session over the
//! workspace and returns either the agent's answer (reader operations) or
//! the workspace snapshot once the agent is done (editor operations).
//!
//! ```ignore
//! use toolbox::{Toolbox, ToolboxConfig};
//!
//! let toolbox = Toolbox::new(snapshot, llm, engine, ToolboxConfig::from_env()?);
//! let answer = toolbox.explain().await?;
//! let commented = toolbox.add_comments().await?;
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::agent::{AgentSession, SessionMode, SessionState};
use crate::builder::{Builder, GoBuilder, MavenBuilder};
use crate::config::ToolboxConfig;
use crate::error::{ConfigError, ToolboxError};
use crate::execution::ContainerEngine;
use crate::llm::LlmProvider;
use crate::snapshot::{Snapshot, SnapshotOptions};
use crate::workspace::{JavaWorkspace, SimpleWorkspace, Workspace};

/// Which workspace the agent gets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceFlavor {
    /// Plain file workspace with the Maven and Go builders as separate tools.
    #[default]
    Simple,
    /// Maven project whose workspace builds and tests itself.
    Java,
}

impl fmt::Display for WorkspaceFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkspaceFlavor::Simple => write!(f, "simple"),
            WorkspaceFlavor::Java => write!(f, "java"),
        }
    }
}

/// Runs agent operations over one source snapshot.
pub struct Toolbox {
    source: Snapshot,
    llm: Arc<dyn LlmProvider>,
    engine: Arc<dyn ContainerEngine>,
    config: ToolboxConfig,
    flavor: WorkspaceFlavor,
}

impl Toolbox {
    pub fn new(
        source: Snapshot,
        llm: Arc<dyn LlmProvider>,
        engine: Arc<dyn ContainerEngine>,
        config: ToolboxConfig,
    ) -> Self {
        Self {
            source,
            llm,
            engine,
            config,
            flavor: WorkspaceFlavor::default(),
        }
    }

    /// Loads `dir` from the host filesystem as the source snapshot.
    pub fn from_dir(
        dir: &Path,
        llm: Arc<dyn LlmProvider>,
        engine: Arc<dyn ContainerEngine>,
        config: ToolboxConfig,
    ) -> Result<Self, ToolboxError> {
        let source = Snapshot::from_dir(dir, &SnapshotOptions::default())?;
        Ok(Self::new(source, llm, engine, config))
    }

    pub fn with_flavor(mut self, flavor: WorkspaceFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    pub fn flavor(&self) -> WorkspaceFlavor {
        self.flavor
    }

    /// The snapshot every operation starts from.
    pub fn source(&self) -> &Snapshot {
        &self.source
    }

    pub fn config(&self) -> &ToolboxConfig {
        &self.config
    }

    /// Explains what the code does and why.
    ///
    /// Returns the agent's last reply as raw markdown; callers render it
    /// (the CLI uses a [`MarkdownRenderer`](crate::render::MarkdownRenderer)).
    pub async fn explain(&self) -> Result<String, ToolboxError> {
        self.read("explain").await
    }

    /// Lists likely bugs with proposed fixes, as unrendered markdown.
    pub async fn find_bugs(&self) -> Result<String, ToolboxError> {
        self.read("find-bugs").await
    }

    /// Carries out a free-form assignment and returns the edited snapshot.
    pub async fn do_ask(&self, ask: &str) -> Result<Snapshot, ToolboxError> {
        self.edit(ask).await
    }

    pub async fn add_comments(&self) -> Result<Snapshot, ToolboxError> {
        self.edit_fixed("add-comments").await
    }

    pub async fn refactor(&self) -> Result<Snapshot, ToolboxError> {
        self.edit_fixed("refactor").await
    }

    /// Updates dependency versions and returns the edited snapshot.
    pub async fn bump_deps(&self) -> Result<Snapshot, ToolboxError> {
        self.edit_fixed("bump-deps").await
    }

    fn assignment(&self, operation: &str) -> Result<&str, ConfigError> {
        self.config.prompts.assignment(operation).ok_or_else(|| {
            ConfigError::ValidationFailed(format!("no assignment configured for '{operation}'"))
        })
    }

    fn session(&self) -> AgentSession {
        AgentSession::new(Arc::clone(&self.llm), self.config.agent_config())
    }

    fn maven(&self) -> MavenBuilder {
        MavenBuilder::new(Arc::clone(&self.engine))
            .with_image(self.config.maven_image.clone())
            .with_limits(self.config.limits())
    }

    fn go(&self) -> GoBuilder {
        GoBuilder::new(Arc::clone(&self.engine))
            .with_image(self.config.go_image.clone())
            .with_limits(self.config.limits())
    }

    /// Session bindings for this flavor.
    fn state(&self) -> SessionState {
        match self.flavor {
            WorkspaceFlavor::Simple => {
                let maven: Arc<dyn Builder> = Arc::new(self.maven());
                let go: Arc<dyn Builder> = Arc::new(self.go());
                SessionState::new(SimpleWorkspace::new(self.source.clone()))
                    .with_builder(maven)
                    .with_builder(go)
            }
            WorkspaceFlavor::Java => SessionState::new(Workspace::Java(JavaWorkspace::new(
                self.source.clone(),
                Arc::new(self.maven()),
            ))),
        }
    }

    async fn read(&self, operation: &str) -> Result<String, ToolboxError> {
        let prompt = self.config.prompts.render_reader(self.assignment(operation)?)?;
        tracing::info!(operation, flavor = %self.flavor, "Running reader operation");

        let outcome = self
            .session()
            .run(SessionMode::Reader, &prompt, self.state())
            .await?;
        Ok(outcome.last_reply)
    }

    async fn edit_fixed(&self, operation: &str) -> Result<Snapshot, ToolboxError> {
        let assignment = self.assignment(operation)?.to_string();
        self.edit(&assignment).await
    }

    async fn edit(&self, assignment: &str) -> Result<Snapshot, ToolboxError> {
        let state = self.state();
        let builders: Vec<&str> = state.builders().iter().map(|b| b.name()).collect();
        let prompt = self.config.prompts.render_editor(assignment, &builders)?;
        tracing::info!(flavor = %self.flavor, builders = ?builders, "Running editor operation");

        let outcome = self
            .session()
            .run(SessionMode::Editor, &prompt, state)
            .await?;

        let result = outcome.state.workspace.dir().clone();
        let diff = self.source.diff(&result);
        tracing::info!(
            steps = outcome.steps,
            added = diff.added.len(),
            modified = diff.modified.len(),
            removed = diff.removed.len(),
            "Editor operation finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::test_support::ScriptedLlm;
    use crate::agent::{AgentError, PromptSet};
    use crate::agent::prompts::{ADD_COMMENTS, EXPLAIN, FIND_BUGS};
    use crate::builder::test_support::ScriptedEngine;
    use crate::error::LlmError;
    use serde_json::json;

    const MAIN_GO: &str = "package main\n\nfunc main() {\n\tprintln(\"hi\")\n}\n";

    fn source() -> Snapshot {
        Snapshot::empty()
            .with_new_file("main.go", MAIN_GO)
            .unwrap()
            .with_new_file("go.mod", "module example.com/hello\n")
            .unwrap()
    }

    fn toolbox(llm: Arc<ScriptedLlm>, engine: Arc<ScriptedEngine>) -> Toolbox {
        Toolbox::new(source(), llm, engine, ToolboxConfig::default())
    }

    fn call(tool: &str, arguments: serde_json::Value) -> String {
        json!({ "tool": tool, "arguments": arguments }).to_string()
    }

    fn prompt_of(llm: &ScriptedLlm) -> String {
        llm.requests()[0].messages[1].content.clone()
    }

    fn system_of(llm: &ScriptedLlm) -> String {
        llm.requests()[0].messages[0].content.clone()
    }

    #[tokio::test]
    async fn test_explain_returns_last_reply() {
        let llm = Arc::new(ScriptedLlm::new([
            call("read_file", json!({ "path": "main.go" })),
            "## Summary\n\nPrints a greeting.".to_string(),
        ]));
        let engine = Arc::new(ScriptedEngine::new());

        let answer = toolbox(llm.clone(), engine.clone()).explain().await.unwrap();

        assert_eq!(answer, "## Summary\n\nPrints a greeting.");
        assert!(prompt_of(&llm).contains(EXPLAIN));
        assert!(!system_of(&llm).contains("write_file"));
        assert!(llm.requests()[1].messages[3].content.contains("println"));
        assert!(engine.commands().is_empty());
    }

    #[tokio::test]
    async fn test_find_bugs_uses_fixed_assignment() {
        let llm = Arc::new(ScriptedLlm::new(["No bugs found."]));
        let answer = toolbox(llm.clone(), Arc::new(ScriptedEngine::new()))
            .find_bugs()
            .await
            .unwrap();

        assert_eq!(answer, "No bugs found.");
        assert!(prompt_of(&llm).contains(FIND_BUGS));
    }

    #[tokio::test]
    async fn test_reader_cannot_write() {
        let llm = Arc::new(ScriptedLlm::new([
            call("write_file", json!({ "path": "main.go", "content": "" })),
            "done".to_string(),
        ]));
        let toolbox = toolbox(llm.clone(), Arc::new(ScriptedEngine::new()));

        toolbox.explain().await.unwrap();

        let observation = &llm.requests()[1].messages[3].content;
        assert!(observation.contains("not found"));
        assert_eq!(toolbox.source().file("main.go").unwrap(), MAIN_GO);
    }

    #[tokio::test]
    async fn test_add_comments_returns_edited_snapshot() {
        let commented = "package main\n\n// main prints a greeting.\nfunc main() {\n\tprintln(\"hi\")\n}\n";
        let llm = Arc::new(ScriptedLlm::new([
            call("write_file", json!({ "path": "main.go", "content": commented })),
            call("go_build", json!({})),
            call(
                "write_file",
                json!({ "path": ".toolbox.md", "content": "# Changes\n\nAdded comments to main.go\n" }),
            ),
            "Added comments.".to_string(),
        ]));
        let engine = Arc::new(ScriptedEngine::new());
        let toolbox = toolbox(llm.clone(), engine.clone());

        let result = toolbox.add_comments().await.unwrap();

        assert_eq!(result.file("main.go").unwrap(), commented);
        assert!(result.file(".toolbox.md").unwrap().contains("comments"));
        assert_eq!(toolbox.source().file("main.go").unwrap(), MAIN_GO);
        assert_eq!(engine.commands(), vec![vec!["go", "build", "./..."]]);

        let prompt = prompt_of(&llm);
        assert!(prompt.contains(ADD_COMMENTS));
        assert!(prompt.contains("you have access to a maven builder and a go builder"));
    }

    #[tokio::test]
    async fn test_build_failure_does_not_end_session() {
        let llm = Arc::new(ScriptedLlm::new([
            call("go_build", json!({})),
            call("go_build", json!({})),
            "Fixed.".to_string(),
        ]));
        let engine = Arc::new(ScriptedEngine::new().exit(2, "main.go:3: syntax error"));

        let result = toolbox(llm.clone(), engine).refactor().await.unwrap();

        assert_eq!(result, source());
        let observation = &llm.requests()[1].messages[3].content;
        assert!(observation.contains("main.go:3: syntax error"));
    }

    #[tokio::test]
    async fn test_do_ask_uses_caller_assignment() {
        let llm = Arc::new(ScriptedLlm::new([
            call("rm", json!({ "path": "go.mod" })),
            "Removed go.mod.".to_string(),
        ]));
        let toolbox = toolbox(llm.clone(), Arc::new(ScriptedEngine::new()));

        let result = toolbox.do_ask("delete the module file").await.unwrap();

        assert!(result.file("go.mod").is_err());
        assert!(prompt_of(&llm).contains("<assignment>\ndelete the module file\n</assignment>"));
    }

    #[tokio::test]
    async fn test_java_flavor_builds_with_workspace_tools() {
        let llm = Arc::new(ScriptedLlm::new([
            call("test", json!({})),
            "Dependencies updated.".to_string(),
        ]));
        let engine = Arc::new(ScriptedEngine::new());
        let toolbox = toolbox(llm.clone(), engine.clone()).with_flavor(WorkspaceFlavor::Java);

        toolbox.bump_deps().await.unwrap();

        assert_eq!(engine.commands(), vec![vec!["mvn", "--batch-mode", "test"]]);
        let system = system_of(&llm);
        assert!(!system.contains("go_build"));
        assert!(prompt_of(&llm).contains("use the build and test tools of the workspace"));
    }

    #[tokio::test]
    async fn test_builder_images_come_from_config() {
        let llm = Arc::new(ScriptedLlm::new([call("go_test", json!({})), "ok".to_string()]));
        let engine = Arc::new(ScriptedEngine::new());
        let config = ToolboxConfig::default().with_go_image("golang:1.22");

        Toolbox::new(source(), llm, engine.clone(), config)
            .do_ask("run the tests")
            .await
            .unwrap();

        let calls = engine.calls.lock().unwrap();
        assert_eq!(calls[0].0.image, "golang:1.22");
    }

    #[tokio::test]
    async fn test_llm_error_propagates() {
        let llm = Arc::new(ScriptedLlm::new(Vec::<String>::new()));
        let err = toolbox(llm, Arc::new(ScriptedEngine::new()))
            .explain()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ToolboxError::Agent(AgentError::Llm(LlmError::RequestFailed(_)))
        ));
    }

    #[tokio::test]
    async fn test_step_limit_propagates() {
        let llm = Arc::new(ScriptedLlm::new([
            call("walk", json!({})),
            call("walk", json!({})),
        ]));
        let config = ToolboxConfig::default().with_max_steps(2);
        let err = Toolbox::new(source(), llm, Arc::new(ScriptedEngine::new()), config)
            .explain()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ToolboxError::Agent(AgentError::StepLimitExceeded { max_steps: 2 })
        ));
    }

    #[tokio::test]
    async fn test_template_without_assignment_is_config_error() {
        let prompts = PromptSet {
            reader: "read everything".to_string(),
            ..PromptSet::default()
        };
        let llm = Arc::new(ScriptedLlm::new(["unused"]));
        let err = Toolbox::new(
            source(),
            llm.clone(),
            Arc::new(ScriptedEngine::new()),
            ToolboxConfig::default().with_prompts(prompts),
        )
        .explain()
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            ToolboxError::Config(ConfigError::MissingPlaceholder { .. })
        ));
        assert!(llm.requests().is_empty());
    }

    #[test]
    fn test_from_dir_missing_directory() {
        let err = Toolbox::from_dir(
            Path::new("/nonexistent/toolbox/source"),
            Arc::new(ScriptedLlm::new(Vec::<String>::new())),
            Arc::new(ScriptedEngine::new()),
            ToolboxConfig::default(),
        )
        .err()
        .unwrap();

        assert!(matches!(err, ToolboxError::Workspace(_)));
    }
}
