//! Execution engine abstraction.
//!
//! The [`ExecutionEngine`] trait decouples turn orchestration from the actual
//! model backend (token generation, provider protocol, the tool loop, retries).
//! Engines report progress through [`TurnEvents`]; each handler call completes
//! before the engine moves on, so events are observed in emission order.

use std::path::PathBuf;

use anyhow::Result;
use serde_json::Value;

use crate::core::types::{
    CancelSignal, Message, StreamResult, ToolDescriptor, ToolResult, ToolUse, Usage,
};
use crate::io::model::ModelDescriptor;

/// Everything the engine needs for one turn.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    /// Linear history ending in the new user message, if any.
    pub input: Vec<Message>,
    pub model: ModelDescriptor,
    pub tools: Vec<ToolDescriptor>,
    pub system_prompt: String,
    pub cwd: PathBuf,
    /// Provider thinking options, when the model supports them.
    pub thinking: Option<Value>,
    pub auto_compact: bool,
}

/// Handlers the engine drives during a turn.
///
/// Handlers returning `Result` may fail when a durable write fails; the engine
/// decides whether to abort.
pub trait TurnEvents {
    fn on_message(&mut self, message: &Message) -> Result<()>;

    fn on_text_delta(&mut self, text: &str) -> Result<()>;

    fn on_stream_result(&mut self, result: &StreamResult) -> Result<()>;

    fn on_chunk(&mut self, chunk: &Value, request_id: &str) -> Result<()>;

    fn on_tool_use(&mut self, tool_use: ToolUse) -> ToolUse {
        tool_use
    }

    fn on_tool_result(&mut self, _tool_use: &ToolUse, result: ToolResult) -> ToolResult {
        result
    }

    /// True when the engine may execute `tool_use`.
    fn on_tool_approve(&mut self, tool_use: &ToolUse) -> bool;
}

/// Result of a turn as reported by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineOutcome {
    Success {
        text: String,
        /// Complete linear history after the turn.
        history: Vec<Message>,
        usage: Usage,
        turns_count: u32,
        tool_calls_count: u32,
    },
    Failure {
        error: String,
    },
}

/// Abstraction over model execution backends.
pub trait ExecutionEngine {
    fn run(
        &self,
        request: &TurnRequest,
        cancel: &CancelSignal,
        events: &mut dyn TurnEvents,
    ) -> EngineOutcome;
}
