//! Task execution pipeline: pre-flight resolution, then one driven turn.
//!
//! Pre-flight covers environment resolution, model resolution and history
//! assembly. Any failure there returns before the engine runs or a log is
//! written, so a failed pre-flight leaves the session untouched.

use anyhow::{Context, Result, bail};
use tracing::{info, instrument, warn};

use crate::callbacks::TaskCallbacks;
use crate::context::AgentContext;
use crate::core::assemble::{AssembleRequest, MessageStamp, assemble};
use crate::core::thinking::thinking_options;
use crate::core::types::{
    CancelSignal, ContentPart, FailureStage, TaskKind, TaskResult, ThinkingEffort, cancel_signal,
};
use crate::driver::{ApprovalSettings, Turn, TurnCollaborators, run_turn};
use crate::environment::resolve_environment;
use crate::io::approval_store::ApprovalPolicySource;
use crate::io::engine::{ExecutionEngine, TurnRequest};
use crate::io::message_log::MessageLog;
use crate::io::model::ModelResolver;
use crate::io::prompt::PromptEngine;
use crate::io::request_log::RequestLog;
use crate::io::session_store::SessionStore;
use crate::io::tools::ToolResolver;

/// One unit of work requested by the caller.
#[derive(Debug, Clone)]
pub struct TaskRequest {
    pub kind: TaskKind,
    /// New user text; `None` re-runs the selected prefix.
    pub message: Option<String>,
    pub attachments: Vec<ContentPart>,
    /// Branch point; `None` continues from the committed tip.
    pub parent_uuid: Option<String>,
    pub model_override: Option<String>,
    pub thinking_effort: Option<ThinkingEffort>,
    pub cancel: Option<CancelSignal>,
}

impl TaskRequest {
    pub fn new(kind: TaskKind, message: Option<String>) -> Self {
        Self {
            kind,
            message,
            attachments: Vec::new(),
            parent_uuid: None,
            model_override: None,
            thinking_effort: None,
            cancel: None,
        }
    }

    pub fn send(message: impl Into<String>) -> Self {
        Self::new(TaskKind::Send, Some(message.into()))
    }

    pub fn plan(message: impl Into<String>) -> Self {
        Self::new(TaskKind::Plan, Some(message.into()))
    }

    pub fn with_parent(mut self, parent_uuid: impl Into<String>) -> Self {
        self.parent_uuid = Some(parent_uuid.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_override = Some(model.into());
        self
    }

    pub fn with_thinking(mut self, effort: ThinkingEffort) -> Self {
        self.thinking_effort = Some(effort);
        self
    }

    pub fn with_attachment(mut self, part: ContentPart) -> Self {
        self.attachments.push(part);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// External collaborators for one task.
pub struct Collaborators<'a> {
    pub engine: &'a dyn ExecutionEngine,
    pub tools: &'a dyn ToolResolver,
    pub models: &'a dyn ModelResolver,
    pub message_log: &'a mut dyn MessageLog,
    pub request_log: &'a mut dyn RequestLog,
    pub policy: &'a dyn ApprovalPolicySource,
}

/// Fresh uuid v4 plus the current UTC time.
pub fn fresh_stamp() -> MessageStamp {
    MessageStamp {
        uuid: uuid::Uuid::new_v4().to_string(),
        timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    }
}

/// Resolve everything a turn needs without side effects.
pub fn prepare_turn(
    request: &TaskRequest,
    context: &AgentContext,
    session: &dyn SessionStore,
    tools: &dyn ToolResolver,
    models: &dyn ModelResolver,
) -> Result<Turn> {
    let prompts = PromptEngine::new()?;
    let environment = resolve_environment(request.kind, context, session.id(), tools, &prompts)?;

    let explicit = request
        .model_override
        .as_deref()
        .or(environment.default_model.as_deref());
    let model = models
        .resolve(explicit, context.config.model.as_deref())
        .context("resolve model")?;
    let thinking = request
        .thinking_effort
        .and_then(|effort| thinking_options(&model.id, model.reasoning, effort));

    let assembled = assemble(
        session.history(),
        &AssembleRequest {
            parent_uuid: request.parent_uuid.clone(),
            message: request.message.clone(),
            attachments: request.attachments.clone(),
        },
        fresh_stamp(),
    )
    .context("select branch point")?;
    if assembled.messages.is_empty() {
        bail!("nothing to send: no message and the session history is empty");
    }

    Ok(Turn {
        request: TurnRequest {
            input: assembled.messages,
            model,
            tools: environment.tools,
            system_prompt: environment.system_prompt,
            cwd: context.cwd.clone(),
            thinking,
            auto_compact: context.config.auto_compact,
        },
        user_message: assembled.user_message,
        approval: ApprovalSettings {
            mode: context.config.approval_mode,
            auto_approve_tools: environment.auto_approve_tools,
            unknown_tools: context.config.unknown_tools,
        },
    })
}

/// Run one task end to end.
#[instrument(skip_all, fields(kind = %request.kind, session_id = %session.id()))]
pub fn execute_task(
    request: TaskRequest,
    context: &AgentContext,
    session: &mut dyn SessionStore,
    collaborators: Collaborators<'_>,
    callbacks: &mut TaskCallbacks<'_>,
) -> TaskResult {
    let Collaborators {
        engine,
        tools,
        models,
        message_log,
        request_log,
        policy,
    } = collaborators;

    let turn = match prepare_turn(&request, context, &*session, tools, models) {
        Ok(turn) => turn,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "task pre-flight failed");
            return TaskResult::failure(FailureStage::Preflight, format!("{err:#}"));
        }
    };
    info!(
        model = %turn.request.model.id,
        input = turn.request.input.len(),
        branch = request.parent_uuid.is_some(),
        "task prepared"
    );

    let cancel = request.cancel.unwrap_or_else(cancel_signal);
    run_turn(
        &turn,
        &cancel,
        session,
        TurnCollaborators {
            engine,
            message_log,
            request_log,
            policy,
        },
        callbacks,
    )
}
