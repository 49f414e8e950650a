//! End-to-end toolbox flows with a scripted LLM and container engine.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use toolbox::error::{DockerError, LlmError};
use toolbox::execution::{ContainerEngine, ExecResult, RunSpec};
use toolbox::llm::{Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, Usage};
use toolbox::snapshot::SnapshotOptions;
use toolbox::{Snapshot, Toolbox, ToolboxConfig, WorkspaceFlavor};

const GREETER: &str = "package greeter\n\nfunc Greet(name string) string {\n\treturn \"hello \" + name\n}\n";

const COMMENTED: &str = "package greeter\n\n// Greet returns a greeting for name.\nfunc Greet(name string) string {\n\treturn \"hello \" + name\n}\n";

struct MockLlm {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl MockLlm {
    fn new(replies: Vec<String>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LlmProvider for MockLlm {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        if let Some(message) = request.messages.get(1) {
            self.prompts.lock().unwrap().push(message.content.clone());
        }
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::RequestFailed("script exhausted".to_string()))?;

        Ok(GenerationResponse {
            id: "mock".to_string(),
            model: "mock".to_string(),
            choices: vec![Choice {
                index: 0,
                message: Message::assistant(reply),
                finish_reason: "stop".to_string(),
            }],
            usage: Usage::default(),
        })
    }
}

/// Records commands and the file list each build saw.
#[derive(Default)]
struct MockEngine {
    exit_codes: Mutex<VecDeque<i64>>,
    runs: Mutex<Vec<(Vec<String>, Vec<String>)>>,
}

impl MockEngine {
    fn with_exit_codes(codes: &[i64]) -> Self {
        Self {
            exit_codes: Mutex::new(codes.iter().copied().collect()),
            runs: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ContainerEngine for MockEngine {
    async fn run(&self, spec: &RunSpec, snapshot: &Snapshot) -> Result<ExecResult, DockerError> {
        let files = snapshot.files().map(|(path, _)| path.to_string()).collect();
        self.runs.lock().unwrap().push((spec.command.clone(), files));

        let exit_code = self.exit_codes.lock().unwrap().pop_front().unwrap_or(0);
        Ok(ExecResult {
            exit_code,
            stdout: String::new(),
            stderr: if exit_code == 0 {
                String::new()
            } else {
                "greeter.go:3:1: missing return".to_string()
            },
        })
    }
}

fn call(tool: &str, arguments: serde_json::Value) -> String {
    json!({ "tool": tool, "arguments": arguments }).to_string()
}

fn go_module(dir: &Path) {
    std::fs::write(dir.join("go.mod"), "module example.com/greeter\n\ngo 1.23\n").unwrap();
    std::fs::write(dir.join("greeter.go"), GREETER).unwrap();
}

#[tokio::test]
async fn test_add_comments_flow() {
    let dir = tempfile::tempdir().unwrap();
    go_module(dir.path());

    let llm = Arc::new(MockLlm::new(vec![
        call("walk", json!({ "pattern": "**/*.go" })),
        call("read_file", json!({ "path": "greeter.go" })),
        call("write_file", json!({ "path": "greeter.go", "content": COMMENTED })),
        call("go_build", json!({})),
        call(
            "write_file",
            json!({
                "path": ".toolbox.md",
                "content": "# Changes\n\nAdded doc comments to `Greet` to explain what it returns.\n"
            }),
        ),
        "Added comments to greeter.go.".to_string(),
    ]));
    let engine = Arc::new(MockEngine::default());

    let toolbox = Toolbox::from_dir(dir.path(), llm.clone(), engine.clone(), ToolboxConfig::default())
        .unwrap();
    let result = toolbox.add_comments().await.unwrap();

    assert_eq!(result.file("greeter.go").unwrap(), COMMENTED);
    assert!(result.file(".toolbox.md").unwrap().contains("comments"));
    assert_eq!(result.file("go.mod").unwrap(), toolbox.source().file("go.mod").unwrap());

    // the build ran over the edited tree
    let runs = engine.runs.lock().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].0, vec!["go", "build", "./..."]);
    assert_eq!(runs[0].1, vec!["go.mod", "greeter.go"]);

    // the host directory is untouched until the caller exports
    assert_eq!(std::fs::read_to_string(dir.path().join("greeter.go")).unwrap(), GREETER);

    result.export_changes(toolbox.source(), dir.path()).unwrap();
    let reloaded = Snapshot::from_dir(dir.path(), &SnapshotOptions::default()).unwrap();
    assert_eq!(reloaded, result);

    let prompts = llm.prompts.lock().unwrap();
    assert!(prompts[0].contains("add comments to the existing code"));
}

#[tokio::test]
async fn test_failed_build_is_fixed_in_same_session() {
    let source = Snapshot::empty()
        .with_new_file("go.mod", "module example.com/greeter\n")
        .unwrap()
        .with_new_file("greeter.go", GREETER)
        .unwrap();

    let broken = "package greeter\n\nfunc Greet(name string) string {\n}\n";
    let llm = Arc::new(MockLlm::new(vec![
        call("write_file", json!({ "path": "greeter.go", "content": broken })),
        call("go_test", json!({})),
        call("write_file", json!({ "path": "greeter.go", "content": COMMENTED })),
        call("go_test", json!({})),
        "Refactored.".to_string(),
    ]));
    let engine = Arc::new(MockEngine::with_exit_codes(&[1, 0]));

    let result = Toolbox::new(source, llm, engine.clone(), ToolboxConfig::default())
        .refactor()
        .await
        .unwrap();

    assert_eq!(result.file("greeter.go").unwrap(), COMMENTED);
    assert_eq!(engine.runs.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_java_explain_flow() {
    let source = Snapshot::empty()
        .with_new_file("pom.xml", "<project><artifactId>greeter</artifactId></project>\n")
        .unwrap()
        .with_new_file(
            "src/main/java/Greeter.java",
            "public class Greeter { String greet(String n) { return \"hello \" + n; } }\n",
        )
        .unwrap();

    let llm = Arc::new(MockLlm::new(vec![
        call("list_dir", json!({ "path": "src/main/java" })),
        "# Greeter\n\nBuilds greetings.".to_string(),
    ]));
    let engine = Arc::new(MockEngine::default());

    let answer = Toolbox::new(source, llm, engine.clone(), ToolboxConfig::default())
        .with_flavor(WorkspaceFlavor::Java)
        .explain()
        .await
        .unwrap();

    assert_eq!(answer, "# Greeter\n\nBuilds greetings.");
    assert!(engine.runs.lock().unwrap().is_empty());
}
