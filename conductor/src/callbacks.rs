//! Caller-supplied observers for a task.

use serde_json::Value;

use crate::core::types::{ApprovalCategory, Message, StreamResult, ToolUse};

type MessageFn<'a> = Box<dyn FnMut(&Message) + 'a>;
type TextDeltaFn<'a> = Box<dyn FnMut(&str) + 'a>;
type ChunkFn<'a> = Box<dyn FnMut(&Value, &str) + 'a>;
type StreamResultFn<'a> = Box<dyn FnMut(&StreamResult) + 'a>;
type ToolApproveFn<'a> = Box<dyn FnMut(&ToolUse, Option<ApprovalCategory>) -> bool + 'a>;

/// Optional per-task callbacks. Every callback observes an event only after
/// its durable record (if any) has been written.
#[derive(Default)]
pub struct TaskCallbacks<'a> {
    pub on_message: Option<MessageFn<'a>>,
    pub on_text_delta: Option<TextDeltaFn<'a>>,
    pub on_chunk: Option<ChunkFn<'a>>,
    pub on_stream_result: Option<StreamResultFn<'a>>,
    /// Confirmation hook for tool calls no approval rule settled.
    pub on_tool_approve: Option<ToolApproveFn<'a>>,
}

impl<'a> TaskCallbacks<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_message(mut self, f: impl FnMut(&Message) + 'a) -> Self {
        self.on_message = Some(Box::new(f));
        self
    }

    pub fn on_text_delta(mut self, f: impl FnMut(&str) + 'a) -> Self {
        self.on_text_delta = Some(Box::new(f));
        self
    }

    pub fn on_chunk(mut self, f: impl FnMut(&Value, &str) + 'a) -> Self {
        self.on_chunk = Some(Box::new(f));
        self
    }

    pub fn on_stream_result(mut self, f: impl FnMut(&StreamResult) + 'a) -> Self {
        self.on_stream_result = Some(Box::new(f));
        self
    }

    pub fn on_tool_approve(
        mut self,
        f: impl FnMut(&ToolUse, Option<ApprovalCategory>) -> bool + 'a,
    ) -> Self {
        self.on_tool_approve = Some(Box::new(f));
        self
    }

    pub(crate) fn message(&mut self, message: &Message) {
        if let Some(f) = self.on_message.as_mut() {
            f(message);
        }
    }

    pub(crate) fn text_delta(&mut self, text: &str) {
        if let Some(f) = self.on_text_delta.as_mut() {
            f(text);
        }
    }

    pub(crate) fn chunk(&mut self, chunk: &Value, request_id: &str) {
        if let Some(f) = self.on_chunk.as_mut() {
            f(chunk, request_id);
        }
    }

    pub(crate) fn stream_result(&mut self, result: &StreamResult) {
        if let Some(f) = self.on_stream_result.as_mut() {
            f(result);
        }
    }
}
