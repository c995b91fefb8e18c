//! Per-kind task environment: tool set, system prompt, default model and
//! approval posture.

use anyhow::{Context, Result, bail};
use tracing::{debug, instrument};

use crate::context::AgentContext;
use crate::core::types::{TaskKind, ToolDescriptor};
use crate::io::prompt::{PromptEngine, PromptOptions};
use crate::io::tools::ToolResolver;

#[derive(Debug, Clone)]
pub struct TaskEnvironment {
    pub tools: Vec<ToolDescriptor>,
    pub system_prompt: String,
    pub default_model: Option<String>,
    /// Plan tasks run read-only tools without confirmation.
    pub auto_approve_tools: bool,
}

/// Resolve the environment for `kind`. Reads configuration only.
#[instrument(skip(context, tool_resolver, prompts), fields(kind = %kind))]
pub fn resolve_environment(
    kind: TaskKind,
    context: &AgentContext,
    session_id: &str,
    tool_resolver: &dyn ToolResolver,
    prompts: &PromptEngine,
) -> Result<TaskEnvironment> {
    let config = &context.config;
    let prompt_options = PromptOptions::from_config(&context.product_name, config);

    let environment = match kind {
        TaskKind::Plan => {
            let tools = tool_resolver
                .resolve(context, session_id, false, false)
                .context("resolve plan tools")?;
            if let Some(tool) = tools.iter().find(|tool| tool.is_mutating()) {
                bail!(
                    "tool resolver returned mutating tool '{}' for a plan task",
                    tool.name
                );
            }
            TaskEnvironment {
                tools,
                system_prompt: prompts.render_plan(&prompt_options)?,
                default_model: config.plan_model.clone(),
                auto_approve_tools: true,
            }
        }
        TaskKind::Send => TaskEnvironment {
            tools: tool_resolver
                .resolve(context, session_id, true, true)
                .context("resolve send tools")?,
            system_prompt: prompts.render_system(&prompt_options)?,
            default_model: config.model.clone(),
            auto_approve_tools: false,
        },
    };
    debug!(
        tools = environment.tools.len(),
        default_model = ?environment.default_model,
        auto_approve_tools = environment.auto_approve_tools,
        "task environment resolved"
    );
    Ok(environment)
}
