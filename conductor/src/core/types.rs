//! Shared deterministic types for the orchestration core.
//!
//! These types define stable contracts between the task pipeline, the approval
//! engine and the external collaborators. They carry no I/O.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Shared cancellation flag threaded from the caller to the execution engine.
pub type CancelSignal = Arc<AtomicBool>;

/// Create a fresh, un-cancelled signal.
pub fn cancel_signal() -> CancelSignal {
    Arc::new(AtomicBool::new(false))
}

/// True once the caller has requested cancellation.
pub fn is_cancelled(signal: &CancelSignal) -> bool {
    signal.load(Ordering::SeqCst)
}

/// Which kind of task the caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Full-capability turn: mutating and task-list tools are available.
    Send,
    /// Read-only planning turn.
    Plan,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::Plan => "plan",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Posture governing how much tool execution needs explicit confirmation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ApprovalMode {
    #[default]
    Default,
    AutoEdit,
    Yolo,
}

impl ApprovalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AutoEdit => "autoEdit",
            Self::Yolo => "yolo",
        }
    }
}

impl fmt::Display for ApprovalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "default" => Ok(Self::Default),
            "autoEdit" | "auto-edit" | "auto_edit" => Ok(Self::AutoEdit),
            "yolo" => Ok(Self::Yolo),
            other => Err(format!(
                "unknown approval mode '{other}' (expected default, autoEdit or yolo)"
            )),
        }
    }
}

/// Capability category of a tool; the primary approval signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalCategory {
    Read,
    Write,
    Other,
}

/// Requested reasoning effort for models that support extended thinking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingEffort {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Message,
}

/// One structured content part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    Image {
        data: String,
        mime_type: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        id: String,
        name: String,
        result: Value,
        #[serde(default)]
        is_error: bool,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::Image {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// Message content: plain text, or a structured part sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// A node in the branch-capable conversation tree. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub uuid: String,
    pub parent_uuid: Option<String>,
    pub role: MessageRole,
    pub content: MessageContent,
    #[serde(rename = "type", default)]
    pub kind: MessageType,
    pub timestamp: String,
}

/// A tool invocation requested by the model during a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUse {
    pub name: String,
    pub params: Value,
    pub call_id: String,
}

/// Result of a tool invocation, as reported by the execution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Value,
    #[serde(default)]
    pub is_error: bool,
}

/// Everything a `needs_approval` predicate may look at.
#[derive(Debug, Clone, Copy)]
pub struct ApprovalQuery<'a> {
    pub tool_name: &'a str,
    pub params: &'a Value,
    pub mode: ApprovalMode,
    pub cwd: &'a Path,
}

/// Tool-specific predicate: returns false when this particular call is safe to
/// run without confirmation.
pub type NeedsApproval = Arc<dyn Fn(&ApprovalQuery<'_>) -> bool + Send + Sync>;

/// Approval metadata attached to a tool descriptor.
#[derive(Clone)]
pub struct ToolApproval {
    pub category: ApprovalCategory,
    pub needs_approval: Option<NeedsApproval>,
}

impl ToolApproval {
    pub fn new(category: ApprovalCategory) -> Self {
        Self {
            category,
            needs_approval: None,
        }
    }

    pub fn with_predicate<F>(category: ApprovalCategory, predicate: F) -> Self
    where
        F: Fn(&ApprovalQuery<'_>) -> bool + Send + Sync + 'static,
    {
        Self {
            category,
            needs_approval: Some(Arc::new(predicate)),
        }
    }
}

impl fmt::Debug for ToolApproval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolApproval")
            .field("category", &self.category)
            .field("needs_approval", &self.needs_approval.is_some())
            .finish()
    }
}

/// A tool exposed to the model for one task.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub approval: ToolApproval,
    /// True for tools that mutate the task list.
    pub task_list: bool,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        approval: ToolApproval,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            approval,
            task_list: false,
        }
    }

    pub fn task_list(mut self) -> Self {
        self.task_list = true;
        self
    }

    pub fn category(&self) -> ApprovalCategory {
        self.approval.category
    }

    /// Write-capable or task-list-mutating; never reachable from a plan task.
    pub fn is_mutating(&self) -> bool {
        self.approval.category == ApprovalCategory::Write || self.task_list
    }
}

/// Token accounting reported by the execution engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Structured per-request metadata emitted once per model request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamResult {
    pub request_id: String,
    pub prompt: Value,
    pub model: String,
    pub tools: Vec<String>,
    pub request: Option<Value>,
    pub response: Option<Value>,
    pub error: Option<Value>,
}

/// Pipeline stage at which a task failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    /// Before any model call or log write.
    Preflight,
    /// During the engine turn.
    Turn,
    /// While committing the new history.
    Commit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    pub stage: FailureStage,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskData {
    pub text: String,
    pub history: Vec<Message>,
    pub usage: Usage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetadata {
    pub turns_count: u32,
    pub tool_calls_count: u32,
    pub duration_ms: u64,
}

/// Outcome of one task as surfaced to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskResult {
    Success {
        data: TaskData,
        metadata: TaskMetadata,
    },
    Failure {
        error: TaskError,
    },
}

impl TaskResult {
    pub fn failure(stage: FailureStage, message: impl Into<String>) -> Self {
        Self::Failure {
            error: TaskError {
                stage,
                message: message.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn error(&self) -> Option<&TaskError> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error } => Some(error),
        }
    }
}
