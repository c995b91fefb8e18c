//! Test-only helpers: message builders, a scripted engine and in-memory
//! collaborators.

use std::cell::RefCell;

use anyhow::{Result, anyhow, bail};
use serde_json::Value;
use tempfile::TempDir;

use crate::context::{AgentContext, ContextOptions};
use crate::core::types::{
    CancelSignal, Message, MessageContent, MessageRole, MessageType, StreamResult, ToolUse, Usage,
    is_cancelled,
};
use crate::io::config::ConfigOverrides;
use crate::io::engine::{EngineOutcome, ExecutionEngine, TurnEvents, TurnRequest};
use crate::io::message_log::MessageLog;
use crate::io::model::{ModelDescriptor, ModelResolver};
use crate::io::paths::AgentPaths;
use crate::io::request_log::RequestLog;

/// Deterministic message with text content.
pub fn message(uuid: &str, parent: Option<&str>, role: MessageRole, text: &str) -> Message {
    Message {
        uuid: uuid.to_string(),
        parent_uuid: parent.map(str::to_string),
        role,
        content: MessageContent::Text(text.to_string()),
        kind: MessageType::Message,
        timestamp: "2025-01-01T00:00:00.000Z".to_string(),
    }
}

pub fn user(uuid: &str, parent: Option<&str>, text: &str) -> Message {
    message(uuid, parent, MessageRole::User, text)
}

pub fn assistant(uuid: &str, parent: Option<&str>, text: &str) -> Message {
    message(uuid, parent, MessageRole::Assistant, text)
}

/// A linear chain `ids[0] -> ids[1] -> ...`, alternating user/assistant.
pub fn chain(ids: &[&str]) -> Vec<Message> {
    let mut parent = None;
    ids.iter()
        .enumerate()
        .map(|(index, id)| {
            let role = if index % 2 == 0 {
                MessageRole::User
            } else {
                MessageRole::Assistant
            };
            let msg = message(id, parent, role, id);
            parent = Some(*id);
            msg
        })
        .collect()
}

pub fn tool_use(name: &str, params: Value) -> ToolUse {
    ToolUse {
        name: name.to_string(),
        params,
        call_id: format!("call-{name}"),
    }
}

pub fn stream_result(request_id: &str) -> StreamResult {
    StreamResult {
        request_id: request_id.to_string(),
        prompt: Value::Null,
        model: "test-model".to_string(),
        tools: Vec::new(),
        request: None,
        response: None,
        error: None,
    }
}

/// One scripted engine event.
#[derive(Debug, Clone)]
pub enum EngineStep {
    /// Assistant message parented on the previous history tip.
    Reply(String),
    TextDelta(String),
    Chunk { request_id: String, chunk: Value },
    StreamResult(StreamResult),
    /// Ask for approval; the decision is recorded in `approvals`.
    ToolCall(ToolUse),
}

/// Engine that replays a fixed script against the event handlers.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    steps: Vec<EngineStep>,
    failure: Option<String>,
    ignore_event_errors: bool,
    /// Every request the engine was run with.
    pub requests: RefCell<Vec<TurnRequest>>,
    /// `(tool name, approved)` for every tool call.
    pub approvals: RefCell<Vec<(String, bool)>>,
}

impl ScriptedEngine {
    pub fn new(steps: Vec<EngineStep>) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }

    /// Engine that replies once with `text`.
    pub fn reply(text: &str) -> Self {
        Self::new(vec![EngineStep::Reply(text.to_string())])
    }

    /// Run the script, then report `error` instead of success.
    pub fn failing(mut self, error: &str) -> Self {
        self.failure = Some(error.to_string());
        self
    }

    /// Keep going (and report success) when a handler returns an error.
    pub fn ignoring_event_errors(mut self) -> Self {
        self.ignore_event_errors = true;
        self
    }

    pub fn run_count(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn last_request(&self) -> Option<TurnRequest> {
        self.requests.borrow().last().cloned()
    }

    fn play(
        &self,
        history: &mut Vec<Message>,
        events: &mut dyn TurnEvents,
        text: &mut String,
        tool_calls: &mut u32,
    ) -> Result<()> {
        for step in &self.steps {
            let outcome = match step {
                EngineStep::Reply(reply) => {
                    let msg = assistant(
                        &uuid::Uuid::new_v4().to_string(),
                        history.last().map(|m| m.uuid.as_str()),
                        reply,
                    );
                    text.clone_from(reply);
                    history.push(msg.clone());
                    events.on_message(&msg)
                }
                EngineStep::TextDelta(delta) => events.on_text_delta(delta),
                EngineStep::Chunk { request_id, chunk } => events.on_chunk(chunk, request_id),
                EngineStep::StreamResult(result) => events.on_stream_result(result),
                EngineStep::ToolCall(call) => {
                    let call = events.on_tool_use(call.clone());
                    let approved = events.on_tool_approve(&call);
                    self.approvals
                        .borrow_mut()
                        .push((call.name.clone(), approved));
                    *tool_calls += 1;
                    Ok(())
                }
            };
            if let Err(err) = outcome {
                if !self.ignore_event_errors {
                    return Err(err);
                }
            }
        }
        Ok(())
    }
}

impl ExecutionEngine for ScriptedEngine {
    fn run(
        &self,
        request: &TurnRequest,
        cancel: &CancelSignal,
        events: &mut dyn TurnEvents,
    ) -> EngineOutcome {
        self.requests.borrow_mut().push(request.clone());
        if is_cancelled(cancel) {
            return EngineOutcome::Failure {
                error: "cancelled".to_string(),
            };
        }
        let mut history = request.input.clone();
        let mut text = String::new();
        let mut tool_calls = 0;
        if let Err(err) = self.play(&mut history, events, &mut text, &mut tool_calls) {
            return EngineOutcome::Failure {
                error: format!("{err:#}"),
            };
        }
        if let Some(error) = &self.failure {
            return EngineOutcome::Failure {
                error: error.clone(),
            };
        }
        EngineOutcome::Success {
            text,
            history,
            usage: Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
            },
            turns_count: 1,
            tool_calls_count: tool_calls,
        }
    }
}

/// Resolver that needs no credentials.
#[derive(Debug, Default)]
pub struct StaticModelResolver {
    /// `(explicit, fallback)` for every call.
    pub calls: RefCell<Vec<(Option<String>, Option<String>)>>,
}

impl ModelResolver for StaticModelResolver {
    fn resolve(&self, explicit: Option<&str>, fallback: Option<&str>) -> Result<ModelDescriptor> {
        self.calls
            .borrow_mut()
            .push((explicit.map(str::to_string), fallback.map(str::to_string)));
        let id = explicit
            .or(fallback)
            .ok_or_else(|| anyhow!("a language model must be specified in config or arguments"))?;
        Ok(ModelDescriptor::with_metadata(
            id,
            "test-key".to_string(),
            None,
        ))
    }
}

/// In-memory message log that can be told to fail.
#[derive(Debug, Default)]
pub struct MemoryMessageLog {
    pub entries: Vec<(String, Message)>,
    /// Appends at or beyond this count fail.
    pub fail_from: Option<usize>,
}

impl MemoryMessageLog {
    pub fn failing_from(count: usize) -> Self {
        Self {
            entries: Vec::new(),
            fail_from: Some(count),
        }
    }
}

impl MessageLog for MemoryMessageLog {
    fn append(&mut self, session_id: &str, message: &Message) -> Result<()> {
        if self.fail_from.is_some_and(|limit| self.entries.len() >= limit) {
            bail!("message log unavailable");
        }
        self.entries.push((session_id.to_string(), message.clone()));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryRequestLog {
    pub metadata: Vec<StreamResult>,
    pub chunks: Vec<(String, Value)>,
    pub fail: bool,
}

impl RequestLog for MemoryRequestLog {
    fn log_metadata(&mut self, _session_id: &str, result: &StreamResult) -> Result<()> {
        if self.fail {
            bail!("request log unavailable");
        }
        self.metadata.push(result.clone());
        Ok(())
    }

    fn log_chunk(&mut self, _session_id: &str, request_id: &str, chunk: &Value) -> Result<()> {
        if self.fail {
            bail!("request log unavailable");
        }
        self.chunks.push((request_id.to_string(), chunk.clone()));
        Ok(())
    }
}

/// Temporary project root with a configured model.
pub struct TestWorkspace {
    pub dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn context_options(&self) -> ContextOptions {
        let mut options = ContextOptions::new(self.dir.path());
        options.overrides = ConfigOverrides {
            model: Some("test-model".to_string()),
            plan_model: Some("test-plan-model".to_string()),
            ..ConfigOverrides::default()
        };
        options
    }

    pub fn context(&self) -> AgentContext {
        AgentContext::create(self.context_options()).expect("context")
    }

    pub fn paths(&self) -> AgentPaths {
        self.context().paths
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}
