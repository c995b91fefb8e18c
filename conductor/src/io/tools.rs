//! Tool resolution for a task, plus the built-in catalog.

use anyhow::Result;
use tracing::debug;

use crate::context::AgentContext;
use crate::core::types::{ApprovalCategory, ApprovalQuery, ToolApproval, ToolDescriptor};

/// Built-in tool names.
pub mod names {
    pub const READ: &str = "read";
    pub const LS: &str = "ls";
    pub const GLOB: &str = "glob";
    pub const GREP: &str = "grep";
    pub const FETCH: &str = "fetch";
    pub const WRITE: &str = "write";
    pub const EDIT: &str = "edit";
    pub const BASH: &str = "bash";
    pub const TODO_READ: &str = "todo_read";
    pub const TODO_WRITE: &str = "todo_write";
}

/// Produces the tool set for one task.
///
/// `include_write` and `include_task_list` decide availability; callers never
/// filter the result themselves.
pub trait ToolResolver {
    fn resolve(
        &self,
        context: &AgentContext,
        session_id: &str,
        include_write: bool,
        include_task_list: bool,
    ) -> Result<Vec<ToolDescriptor>>;
}

/// Commands `bash` may run without confirmation.
const READ_ONLY_COMMANDS: &[&str] = &[
    "cat", "cd", "date", "echo", "file", "find", "git", "grep", "head", "ls", "pwd", "rg", "stat",
    "tail", "tree", "wc", "which", "whoami",
];

/// `git` subcommands that never touch the worktree or refs.
const READ_ONLY_GIT: &[&str] = &["blame", "diff", "log", "show", "status"];

const SHELL_CONTROL: &[char] = &[';', '&', '|', '>', '<', '`', '$', '\n'];

/// Arguments that make an otherwise read-only program write files or run
/// other programs (`rg --pre`, `git diff --output`, `find -exec`/`-fprint`).
const UNSAFE_ARG_PREFIXES: &[&str] = &[
    "--pre", "--output", "-exec", "-ok", "-delete", "-fprint", "-fls",
];

/// False when `command` is a single read-only invocation.
fn bash_needs_approval(query: &ApprovalQuery<'_>) -> bool {
    let Some(command) = query.params.get("command").and_then(|c| c.as_str()) else {
        return true;
    };
    if command.contains(SHELL_CONTROL) {
        return true;
    }
    let mut words = command.split_whitespace();
    let Some(program) = words.next() else {
        return true;
    };
    if !READ_ONLY_COMMANDS.contains(&program) {
        return true;
    }
    let args: Vec<&str> = words.collect();
    if args
        .iter()
        .any(|arg| UNSAFE_ARG_PREFIXES.iter().any(|prefix| arg.starts_with(prefix)))
    {
        return true;
    }
    program == "git" && !args.first().is_some_and(|sub| READ_ONLY_GIT.contains(sub))
}

/// The built-in tool set.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog;

impl ToolCatalog {
    pub fn new() -> Self {
        Self
    }

    fn read_tools() -> Vec<ToolDescriptor> {
        let read = |name: &str, description: &str| {
            ToolDescriptor::new(name, description, ToolApproval::new(ApprovalCategory::Read))
        };
        vec![
            read(names::READ, "Read a file from the workspace."),
            read(names::LS, "List a directory."),
            read(names::GLOB, "Find files by glob pattern."),
            read(names::GREP, "Search file contents by regular expression."),
            read(names::FETCH, "Fetch a URL and return its content."),
        ]
    }

    fn write_tools() -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new(
                names::WRITE,
                "Create or overwrite a file.",
                ToolApproval::new(ApprovalCategory::Write),
            ),
            ToolDescriptor::new(
                names::EDIT,
                "Replace text within a file.",
                ToolApproval::new(ApprovalCategory::Write),
            ),
            ToolDescriptor::new(
                names::BASH,
                "Run a shell command in the workspace.",
                ToolApproval::with_predicate(ApprovalCategory::Other, bash_needs_approval),
            ),
        ]
    }

    fn task_list_tools() -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new(
                names::TODO_READ,
                "Read the session task list.",
                ToolApproval::new(ApprovalCategory::Read),
            )
            .task_list(),
            ToolDescriptor::new(
                names::TODO_WRITE,
                "Replace the session task list.",
                ToolApproval::new(ApprovalCategory::Other),
            )
            .task_list(),
        ]
    }
}

impl ToolResolver for ToolCatalog {
    fn resolve(
        &self,
        _context: &AgentContext,
        session_id: &str,
        include_write: bool,
        include_task_list: bool,
    ) -> Result<Vec<ToolDescriptor>> {
        let mut tools = Self::read_tools();
        if include_write {
            tools.extend(Self::write_tools());
        }
        if include_task_list {
            tools.extend(Self::task_list_tools());
        }
        debug!(
            session_id,
            include_write,
            include_task_list,
            count = tools.len(),
            "resolved tools"
        );
        Ok(tools)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ApprovalMode;
    use serde_json::{Value, json};
    use std::path::Path;

    fn needs(params: Value) -> bool {
        bash_needs_approval(&ApprovalQuery {
            tool_name: names::BASH,
            params: &params,
            mode: ApprovalMode::Default,
            cwd: Path::new("/work"),
        })
    }

    #[test]
    fn read_only_commands_skip_confirmation() {
        assert!(!needs(json!({"command": "ls -la src"})));
        assert!(!needs(json!({"command": "git status"})));
        assert!(!needs(json!({"command": "rg TODO"})));
        assert!(!needs(json!({"command": "tail -n 20 log.txt"})));
        assert!(!needs(json!({"command": "find . -name '*.rs'"})));
    }

    #[test]
    fn everything_else_needs_confirmation() {
        assert!(needs(json!({"command": "rm -rf target"})));
        assert!(needs(json!({"command": "git push"})));
        assert!(needs(json!({"command": "ls; rm x"})));
        assert!(needs(json!({"command": "cat a > b"})));
        assert!(needs(json!({"command": "find . -delete"})));
        assert!(needs(json!({"command": "rg --pre ./payload.sh x"})));
        assert!(needs(json!({"command": "git diff --output=/tmp/out"})));
        assert!(needs(json!({"command": "git log --output /tmp/out"})));
        assert!(needs(json!({"command": "find . -fprint /tmp/out"})));
        assert!(needs(json!({"command": "find . -fprintf /tmp/out %p"})));
        assert!(needs(json!({"command": "find . -fls /tmp/out"})));
        assert!(needs(json!({"command": "find . -name x -ok rm {} +"})));
        assert!(needs(json!({"command": "find . -okdir rm {} +"})));
        assert!(needs(json!({"command": "find . -exec rm {} +"})));
        assert!(needs(json!({"command": "  "})));
        assert!(needs(json!({})));
    }

    #[test]
    fn task_list_tools_are_flagged() {
        let tools = ToolCatalog::task_list_tools();
        assert!(tools.iter().all(|tool| tool.task_list));
        assert!(tools.iter().all(ToolDescriptor::is_mutating));
    }
}
