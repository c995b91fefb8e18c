//! Provider options for extended thinking.

use serde_json::{Value, json};

use crate::core::types::ThinkingEffort;

const LOW_BUDGET_TOKENS: u32 = 1024;
const DEFAULT_BUDGET_TOKENS: u32 = 31_999;

/// Thinking options for a model, or `None` when the model does not reason or
/// its provider has no thinking knob.
pub fn thinking_options(model_id: &str, reasoning: bool, effort: ThinkingEffort) -> Option<Value> {
    if !reasoning || !model_id.starts_with("claude-") {
        return None;
    }
    let budget = match effort {
        ThinkingEffort::Low => LOW_BUDGET_TOKENS,
        ThinkingEffort::Medium | ThinkingEffort::High => DEFAULT_BUDGET_TOKENS,
    };
    Some(json!({
        "provider_options": {
            "anthropic": {
                "thinking": { "type": "enabled", "budget_tokens": budget }
            }
        }
    }))
}
