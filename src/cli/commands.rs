//! CLI command definitions for toolbox.
//!
//! Every subcommand loads a source directory, runs one toolbox operation
//! over it and either prints the agent's answer or writes the edited files.

use crate::config::ToolboxConfig;
use crate::error::LlmError;
use crate::execution::DockerEngine;
use crate::llm::{LiteLlmClient, LiteLlmSettings, LlmProvider, OpenRouterProvider};
use crate::render::{MarkdownRenderer, PlainRenderer, TerminalRenderer};
use crate::snapshot::{Snapshot, SnapshotDiff};
use crate::toolbox::{Toolbox, WorkspaceFlavor};
use anyhow::Context;
use clap::Parser;
use console::style;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// LLM agents that read, explain and edit source trees.
#[derive(Parser, Debug)]
#[command(name = "toolbox")]
#[command(about = "Explain, review and edit source code with an LLM agent")]
#[command(version)]
#[command(
    long_about = "toolbox gives an LLM agent a sandboxed copy of a source directory.\n\nReader commands (explain, find-bugs) print the agent's answer. Editor commands\n(do, add-comments, refactor, bump-deps) let the agent edit the files, build and\ntest them in containers, and write the result back.\n\nExample usage:\n  toolbox explain ./my-service\n  toolbox do \"add input validation to the handlers\" ./my-service --dry-run"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "warn", global = true)]
    pub log_level: String,

    /// LLM model to use (overrides TOOLBOX_MODEL).
    #[arg(short = 'm', long, global = true)]
    pub model: Option<String>,

    /// OpenRouter API key.
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Treat the source as a Maven project with its own build and test tools.
    #[arg(long, global = true)]
    pub java: bool,

    /// Maximum agent steps per session (overrides TOOLBOX_MAX_STEPS).
    #[arg(long, global = true)]
    pub max_steps: Option<usize>,

    /// Print answers as raw markdown.
    #[arg(long, global = true)]
    pub raw: bool,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Explain what the code does and why.
    Explain(ReadArgs),

    /// Find potential bugs and propose fixes.
    FindBugs(ReadArgs),

    /// Carry out a free-form assignment on the code.
    Do(DoArgs),

    /// Add comments to the code.
    AddComments(EditArgs),

    /// Refactor the code for readability and maintainability.
    Refactor(EditArgs),

    /// Update dependencies to their latest versions.
    BumpDeps(EditArgs),
}

/// Arguments for reader commands.
#[derive(Parser, Debug)]
pub struct ReadArgs {
    /// Source directory.
    #[arg(default_value = ".")]
    pub src: PathBuf,
}

/// Arguments for editor commands.
#[derive(Parser, Debug)]
pub struct EditArgs {
    /// Source directory.
    #[arg(default_value = ".")]
    pub src: PathBuf,

    /// Write the edited tree here instead of back into the source directory.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Report the changes without writing anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for `toolbox do`.
#[derive(Parser, Debug)]
pub struct DoArgs {
    /// What the agent should do.
    pub ask: String,

    #[command(flatten)]
    pub edit: EditArgs,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(&cli)?;
    let renderer = renderer(cli.raw);
    let flavor = if cli.java {
        WorkspaceFlavor::Java
    } else {
        WorkspaceFlavor::Simple
    };

    match &cli.command {
        Commands::Explain(args) => {
            let toolbox = build_toolbox(&cli, &args.src, config, flavor)?;
            let answer = toolbox.explain().await?;
            println!("{}", renderer.render(&answer));
        }
        Commands::FindBugs(args) => {
            let toolbox = build_toolbox(&cli, &args.src, config, flavor)?;
            let answer = toolbox.find_bugs().await?;
            println!("{}", renderer.render(&answer));
        }
        Commands::Do(args) => {
            let toolbox = build_toolbox(&cli, &args.edit.src, config, flavor)?;
            let result = toolbox.do_ask(&args.ask).await?;
            apply_edits(&args.edit, toolbox.source(), &result)?;
        }
        Commands::AddComments(args) => {
            let toolbox = build_toolbox(&cli, &args.src, config, flavor)?;
            let result = toolbox.add_comments().await?;
            apply_edits(args, toolbox.source(), &result)?;
        }
        Commands::Refactor(args) => {
            let toolbox = build_toolbox(&cli, &args.src, config, flavor)?;
            let result = toolbox.refactor().await?;
            apply_edits(args, toolbox.source(), &result)?;
        }
        Commands::BumpDeps(args) => {
            let toolbox = build_toolbox(&cli, &args.src, config, flavor)?;
            let result = toolbox.bump_deps().await?;
            apply_edits(args, toolbox.source(), &result)?;
        }
    }
    Ok(())
}

/// Environment configuration with the global flags applied on top.
fn resolve_config(cli: &Cli) -> anyhow::Result<ToolboxConfig> {
    let mut config = ToolboxConfig::from_env().context("Invalid toolbox configuration")?;
    if let Some(model) = &cli.model {
        config = config.with_model(model.clone());
    }
    if let Some(max_steps) = cli.max_steps {
        config = config.with_max_steps(max_steps);
    }
    config.validate()?;
    Ok(config)
}

fn renderer(raw: bool) -> Box<dyn MarkdownRenderer> {
    if raw {
        Box::new(PlainRenderer)
    } else {
        Box::new(TerminalRenderer::new())
    }
}

fn build_toolbox(
    cli: &Cli,
    src: &Path,
    config: ToolboxConfig,
    flavor: WorkspaceFlavor,
) -> anyhow::Result<Toolbox> {
    let llm = build_llm_client(cli.api_key.clone(), config.model.clone())?;
    let engine = Arc::new(DockerEngine::connect()?);
    info!(src = %src.display(), flavor = %flavor, model = %config.model, "Loading source");
    Ok(Toolbox::from_dir(src, llm, engine, config)?.with_flavor(flavor))
}

/// LLM backend chosen from the command line and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LlmBackend {
    OpenRouter { api_key: String },
    LiteLlm(LiteLlmSettings),
}

/// `--api-key`/`OPENROUTER_API_KEY` selects OpenRouter; otherwise
/// `LITELLM_API_BASE` selects the LiteLLM proxy, with its optional key.
fn select_backend<F>(api_key: Option<String>, lookup: F) -> Result<LlmBackend, LlmError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(api_key) = api_key.filter(|key| !key.trim().is_empty()) {
        return Ok(LlmBackend::OpenRouter { api_key });
    }

    match LiteLlmSettings::from_lookup(&lookup) {
        Ok(settings) => Ok(LlmBackend::LiteLlm(settings)),
        Err(LlmError::MissingApiBase)
            if lookup("LITELLM_API_KEY").map_or(true, |key| key.trim().is_empty()) =>
        {
            Err(LlmError::MissingApiKey)
        }
        Err(err) => Err(err),
    }
}

fn build_llm_client(
    api_key: Option<String>,
    model: String,
) -> anyhow::Result<Arc<dyn LlmProvider>> {
    let backend = select_backend(api_key, |key| std::env::var(key).ok())
        .context("Failed to initialize LLM client")?;

    Ok(match backend {
        LlmBackend::OpenRouter { api_key } => {
            let provider = OpenRouterProvider::with_model(api_key, model);
            info!(
                model = %provider.default_model(),
                key = %provider.api_key_masked(),
                "Using OpenRouter"
            );
            Arc::new(provider)
        }
        LlmBackend::LiteLlm(settings) => {
            info!(api_base = %settings.api_base, model = %model, "Using LiteLLM proxy");
            Arc::new(LiteLlmClient::new(settings))
        }
    })
}

/// Prints the change set and writes it unless this is a dry run.
fn apply_edits(args: &EditArgs, source: &Snapshot, result: &Snapshot) -> anyhow::Result<()> {
    let diff = source.diff(result);
    print!("{}", describe_changes(&diff));

    if args.dry_run || diff.is_empty() {
        return Ok(());
    }

    match &args.output {
        Some(dest) => {
            result
                .export(dest)
                .with_context(|| format!("Failed to write {}", dest.display()))?;
            println!("Wrote {} files to {}", result.files().count(), dest.display());
        }
        None => {
            result
                .export_changes(source, &args.src)
                .with_context(|| format!("Failed to update {}", args.src.display()))?;
            println!("Updated {}", args.src.display());
        }
    }
    Ok(())
}

fn describe_changes(diff: &SnapshotDiff) -> String {
    if diff.is_empty() {
        return "No changes.\n".to_string();
    }

    let mut out = String::new();
    for path in &diff.added {
        out.push_str(&format!("{} {}\n", style("A").green().bold(), path));
    }
    for path in &diff.modified {
        out.push_str(&format!("{} {}\n", style("M").yellow().bold(), path));
    }
    for path in &diff.removed {
        out.push_str(&format!("{} {}\n", style("D").red().bold(), path));
    }
    out
}
