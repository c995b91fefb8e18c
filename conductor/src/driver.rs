//! Model invocation driver: one engine turn with ordered durable logging,
//! approval delegation and an all-or-nothing history commit.

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::callbacks::TaskCallbacks;
use crate::core::approval::{ApprovalInput, Approver, UnknownToolPolicy, decide};
use crate::core::types::{
    ApprovalMode, CancelSignal, FailureStage, Message, StreamResult, TaskData, TaskMetadata,
    TaskResult, ToolDescriptor, ToolResult, ToolUse,
};
use crate::io::approval_store::{ApprovalPolicySource, snapshot_or_default};
use crate::io::engine::{EngineOutcome, ExecutionEngine, TurnEvents, TurnRequest};
use crate::io::message_log::MessageLog;
use crate::io::request_log::RequestLog;
use crate::io::session_store::SessionStore;

/// Approval posture for one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApprovalSettings {
    pub mode: ApprovalMode,
    pub auto_approve_tools: bool,
    pub unknown_tools: UnknownToolPolicy,
}

/// A fully prepared turn.
#[derive(Debug, Clone)]
pub struct Turn {
    pub request: TurnRequest,
    /// New user message, already part of `request.input`.
    pub user_message: Option<Message>,
    pub approval: ApprovalSettings,
}

/// Collaborators the driver writes through.
pub struct TurnCollaborators<'a> {
    pub engine: &'a dyn ExecutionEngine,
    pub message_log: &'a mut dyn MessageLog,
    pub request_log: &'a mut dyn RequestLog,
    pub policy: &'a dyn ApprovalPolicySource,
}

/// Bridges engine events to durable logs, approval and caller callbacks.
struct TurnObserver<'t, 'c> {
    session_id: &'t str,
    tools: &'t [ToolDescriptor],
    cwd: &'t Path,
    approval: ApprovalSettings,
    message_log: &'t mut dyn MessageLog,
    request_log: &'t mut dyn RequestLog,
    policy: &'t dyn ApprovalPolicySource,
    callbacks: &'t mut TaskCallbacks<'c>,
    /// First durable-log failure of the turn.
    fault: Option<String>,
}

impl TurnObserver<'_, '_> {
    fn record_fault(&mut self, what: &str, err: &anyhow::Error) {
        let message = format!("{what}: {err:#}");
        warn!(session_id = self.session_id, error = %message, "durable log write failed");
        self.fault.get_or_insert(message);
    }
}

impl TurnEvents for TurnObserver<'_, '_> {
    fn on_message(&mut self, message: &Message) -> Result<()> {
        if let Err(err) = self.message_log.append(self.session_id, message) {
            self.record_fault("append message log", &err);
            return Err(err);
        }
        self.callbacks.message(message);
        Ok(())
    }

    fn on_text_delta(&mut self, text: &str) -> Result<()> {
        self.callbacks.text_delta(text);
        Ok(())
    }

    fn on_stream_result(&mut self, result: &StreamResult) -> Result<()> {
        if let Err(err) = self.request_log.log_metadata(self.session_id, result) {
            self.record_fault("log request metadata", &err);
            return Err(err);
        }
        self.callbacks.stream_result(result);
        Ok(())
    }

    fn on_chunk(&mut self, chunk: &Value, request_id: &str) -> Result<()> {
        if let Err(err) = self.request_log.log_chunk(self.session_id, request_id, chunk) {
            self.record_fault("log request chunk", &err);
            return Err(err);
        }
        self.callbacks.chunk(chunk, request_id);
        Ok(())
    }

    fn on_tool_use(&mut self, tool_use: ToolUse) -> ToolUse {
        tool_use
    }

    fn on_tool_result(&mut self, _tool_use: &ToolUse, result: ToolResult) -> ToolResult {
        result
    }

    fn on_tool_approve(&mut self, tool_use: &ToolUse) -> bool {
        let policy = snapshot_or_default(self.policy);
        let tool = self.tools.iter().find(|tool| tool.name == tool_use.name);
        let input = ApprovalInput {
            tool_use,
            tool,
            mode: self.approval.mode,
            auto_approve_tools: self.approval.auto_approve_tools,
            policy: &policy,
            unknown_tools: self.approval.unknown_tools,
            cwd: self.cwd,
        };
        let approver: Option<Approver<'_>> = match self.callbacks.on_tool_approve.as_mut() {
            Some(f) => Some(f.as_mut()),
            None => None,
        };
        decide(&input, approver).approved
    }
}

/// Run one turn and commit its history on success.
///
/// The user message is logged and then shown to the caller before the engine
/// starts. History is committed only if the engine succeeds and every durable
/// write during the turn succeeded.
#[instrument(skip_all, fields(session_id = %session.id(), model = %turn.request.model.id))]
pub fn run_turn(
    turn: &Turn,
    cancel: &CancelSignal,
    session: &mut dyn SessionStore,
    collaborators: TurnCollaborators<'_>,
    callbacks: &mut TaskCallbacks<'_>,
) -> TaskResult {
    let start = Instant::now();
    let session_id = session.id().to_string();
    let TurnCollaborators {
        engine,
        message_log,
        request_log,
        policy,
    } = collaborators;

    if let Some(user_message) = &turn.user_message {
        if let Err(err) = message_log.append(&session_id, user_message) {
            warn!(error = %format!("{err:#}"), "failed to log user message");
            return TaskResult::failure(
                FailureStage::Turn,
                format!("append message log: {err:#}"),
            );
        }
        callbacks.message(user_message);
    }

    let mut observer = TurnObserver {
        session_id: &session_id,
        tools: &turn.request.tools,
        cwd: &turn.request.cwd,
        approval: turn.approval,
        message_log,
        request_log,
        policy,
        callbacks,
        fault: None,
    };
    info!(input = turn.request.input.len(), tools = turn.request.tools.len(), "starting turn");
    let outcome = engine.run(&turn.request, cancel, &mut observer);
    let fault = observer.fault.take();

    let (text, history, usage, turns_count, tool_calls_count) = match outcome {
        EngineOutcome::Failure { error } => {
            warn!(error = %error, "engine turn failed");
            return TaskResult::failure(FailureStage::Turn, error);
        }
        EngineOutcome::Success {
            text,
            history,
            usage,
            turns_count,
            tool_calls_count,
        } => (text, history, usage, turns_count, tool_calls_count),
    };

    if let Some(fault) = fault {
        warn!(error = %fault, "turn succeeded but a durable write failed; not committing");
        return TaskResult::failure(FailureStage::Turn, fault);
    }

    if let Err(err) = session.replace_history(history.clone()) {
        warn!(error = %format!("{err:#}"), "history commit failed");
        return TaskResult::failure(FailureStage::Commit, format!("{err:#}"));
    }

    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    debug!(turns_count, tool_calls_count, duration_ms, "turn committed");
    TaskResult::Success {
        data: TaskData {
            text,
            history,
            usage,
        },
        metadata: TaskMetadata {
            turns_count,
            tool_calls_count,
            duration_ms,
        },
    }
}
