//! `conductor` command line: inspect task environments, session histories and
//! session approval policies.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use conductor::context::{AgentContext, ContextOptions};
use conductor::core::types::{ApprovalCategory, ApprovalMode, Message, TaskKind};
use conductor::environment::resolve_environment;
use conductor::io::approval_store::FilePolicyStore;
use conductor::io::config::ConfigOverrides;
use conductor::io::prompt::PromptEngine;
use conductor::io::session_store::{FileSessionStore, SessionStore, list_sessions};
use conductor::io::tools::ToolCatalog;
use conductor::logging;

#[derive(Parser)]
#[command(
    name = "conductor",
    version,
    about = "Task execution and tool-approval orchestration for a coding agent"
)]
struct Cli {
    /// Project root (defaults to the current directory).
    #[arg(long, global = true)]
    cwd: Option<PathBuf>,

    /// Model for send tasks.
    #[arg(long, global = true)]
    model: Option<String>,

    /// Model for plan tasks.
    #[arg(long, global = true)]
    plan_model: Option<String>,

    /// Preferred answer language.
    #[arg(long, global = true)]
    language: Option<String>,

    /// Tool approval mode (default, autoEdit, yolo).
    #[arg(long, global = true)]
    approval_mode: Option<ApprovalMode>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Send,
    Plan,
}

impl From<KindArg> for TaskKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Send => TaskKind::Send,
            KindArg::Plan => TaskKind::Plan,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Print the resolved environment (tools, prompt, model) for a task kind.
    Env {
        #[arg(value_enum)]
        kind: KindArg,
        /// Session the environment is resolved for.
        #[arg(long, default_value = "preview")]
        session: String,
    },
    /// List committed sessions.
    Sessions,
    /// Print a session's committed history, or the branch ending at `--upto`.
    History {
        session: String,
        #[arg(long)]
        upto: Option<String>,
    },
    /// Pre-approve a tool for a session.
    Approve { session: String, tool: String },
    /// Remove a tool from a session's pre-approved set.
    Revoke { session: String, tool: String },
    /// Set (or `clear`) a session's approval-mode override.
    Mode { session: String, mode: String },
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let context = load_context(&cli)?;
    match cli.command {
        Command::Env { kind, session } => cmd_env(&context, kind.into(), &session),
        Command::Sessions => cmd_sessions(&context),
        Command::History { session, upto } => cmd_history(&context, &session, upto.as_deref()),
        Command::Approve { session, tool } => {
            let policy = FilePolicyStore::for_session(&context.paths, &session)?.approve_tool(&tool)?;
            print_json(&policy)
        }
        Command::Revoke { session, tool } => {
            let policy = FilePolicyStore::for_session(&context.paths, &session)?.revoke_tool(&tool)?;
            print_json(&policy)
        }
        Command::Mode { session, mode } => {
            let mode = parse_mode_override(&mode)?;
            let policy =
                FilePolicyStore::for_session(&context.paths, &session)?.set_mode_override(mode)?;
            print_json(&policy)
        }
    }
}

fn load_context(cli: &Cli) -> Result<AgentContext> {
    let cwd = match &cli.cwd {
        Some(cwd) => cwd.clone(),
        None => std::env::current_dir().context("resolve current directory")?,
    };
    let mut options = ContextOptions::new(cwd);
    options.overrides = ConfigOverrides {
        model: cli.model.clone(),
        plan_model: cli.plan_model.clone(),
        language: cli.language.clone(),
        approval_mode: cli.approval_mode,
        ..ConfigOverrides::default()
    };
    AgentContext::create(options)
}

fn parse_mode_override(raw: &str) -> Result<Option<ApprovalMode>> {
    if raw == "clear" {
        return Ok(None);
    }
    raw.parse::<ApprovalMode>()
        .map(Some)
        .map_err(anyhow::Error::msg)
}

#[derive(Serialize)]
struct ToolView<'a> {
    name: &'a str,
    category: ApprovalCategory,
    task_list: bool,
}

#[derive(Serialize)]
struct EnvironmentView<'a> {
    kind: TaskKind,
    default_model: Option<&'a str>,
    auto_approve_tools: bool,
    tools: Vec<ToolView<'a>>,
    system_prompt: &'a str,
}

fn cmd_env(context: &AgentContext, kind: TaskKind, session: &str) -> Result<()> {
    let prompts = PromptEngine::new()?;
    let environment = resolve_environment(kind, context, session, &ToolCatalog::new(), &prompts)?;
    print_json(&EnvironmentView {
        kind,
        default_model: environment
            .default_model
            .as_deref()
            .or(context.config.model.as_deref()),
        auto_approve_tools: environment.auto_approve_tools,
        tools: environment
            .tools
            .iter()
            .map(|tool| ToolView {
                name: &tool.name,
                category: tool.category(),
                task_list: tool.task_list,
            })
            .collect(),
        system_prompt: &environment.system_prompt,
    })
}

fn cmd_sessions(context: &AgentContext) -> Result<()> {
    for summary in list_sessions(&context.paths)? {
        println!(
            "{}\t{}\t{}",
            summary.session_id,
            summary.messages,
            summary.last_timestamp.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn cmd_history(context: &AgentContext, session: &str, upto: Option<&str>) -> Result<()> {
    let store = FileSessionStore::open(&context.paths, session)?;
    let messages: Vec<Message> = match upto {
        Some(uuid) => store
            .history()
            .messages_up_to(uuid)
            .with_context(|| format!("history of session '{session}'"))?,
        None => store.history().messages(),
    };
    for message in &messages {
        println!(
            "{}",
            serde_json::to_string(message).context("serialize message")?
        );
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{payload}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_env_plan() {
        let cli = Cli::parse_from(["conductor", "env", "plan"]);
        assert!(matches!(
            cli.command,
            Command::Env {
                kind: KindArg::Plan,
                ..
            }
        ));
    }

    #[test]
    fn parse_global_overrides_after_subcommand() {
        let cli = Cli::parse_from([
            "conductor",
            "history",
            "s1",
            "--upto",
            "m2",
            "--approval-mode",
            "autoEdit",
        ]);
        assert_eq!(cli.approval_mode, Some(ApprovalMode::AutoEdit));
        assert!(matches!(
            cli.command,
            Command::History { ref session, upto: Some(ref upto) } if session == "s1" && upto == "m2"
        ));
    }

    #[test]
    fn mode_override_accepts_clear() {
        assert_eq!(parse_mode_override("clear").expect("clear"), None);
        assert_eq!(
            parse_mode_override("yolo").expect("yolo"),
            Some(ApprovalMode::Yolo)
        );
        assert!(parse_mode_override("reckless").is_err());
    }
}
