//! System prompt rendering for each task kind.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use tracing::debug;

use crate::io::config::AgentConfig;
use crate::io::tools::names;

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");
const PLAN_TEMPLATE: &str = include_str!("prompts/plan.md");

/// Inputs shared by both prompt variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptOptions {
    pub product_name: String,
    pub language: String,
    /// Include the task-list section (full-capability prompt only).
    pub todo: bool,
    pub append: Option<String>,
}

impl PromptOptions {
    pub fn from_config(product_name: &str, config: &AgentConfig) -> Self {
        Self {
            product_name: product_name.to_string(),
            language: config.language.clone(),
            todo: config.todo,
            append: config.append_system_prompt.clone(),
        }
    }

    /// Language line only when the answer language is not English.
    fn language_instruction(&self) -> Option<&str> {
        let language = self.language.trim();
        (!language.is_empty() && !language.eq_ignore_ascii_case("english")).then_some(language)
    }

    fn append(&self) -> Option<&str> {
        self.append
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("system", SYSTEM_TEMPLATE)
            .context("load system prompt template")?;
        env.add_template("plan", PLAN_TEMPLATE)
            .context("load plan prompt template")?;
        Ok(Self { env })
    }

    /// Full-capability prompt for `send` tasks.
    pub fn render_system(&self, options: &PromptOptions) -> Result<String> {
        let template = self.env.get_template("system")?;
        let rendered = template
            .render(context! {
                product_name => options.product_name,
                language => options.language_instruction(),
                todo => options.todo,
                todo_read => names::TODO_READ,
                todo_write => names::TODO_WRITE,
                bash => names::BASH,
                append => options.append(),
            })
            .context("render system prompt")?;
        debug!(bytes = rendered.len(), "rendered system prompt");
        Ok(rendered.trim().to_string())
    }

    /// Read-only planning prompt for `plan` tasks.
    pub fn render_plan(&self, options: &PromptOptions) -> Result<String> {
        let template = self.env.get_template("plan")?;
        let rendered = template
            .render(context! {
                product_name => options.product_name,
                language => options.language_instruction(),
                append => options.append(),
            })
            .context("render plan prompt")?;
        debug!(bytes = rendered.len(), "rendered plan prompt");
        Ok(rendered.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> PromptOptions {
        PromptOptions {
            product_name: "conductor".to_string(),
            language: "English".to_string(),
            todo: true,
            append: None,
        }
    }

    #[test]
    fn system_prompt_includes_task_section_when_todo_enabled() {
        let engine = PromptEngine::new().expect("engine");
        let prompt = engine.render_system(&options()).expect("render");
        assert!(prompt.starts_with("You are conductor"));
        assert!(prompt.contains("# Task Management"));
        assert!(prompt.contains("todo_write"));
        assert!(!prompt.contains("IMPORTANT: Answer in"));

        let without = engine
            .render_system(&PromptOptions {
                todo: false,
                ..options()
            })
            .expect("render");
        assert!(!without.contains("# Task Management"));
    }

    #[test]
    fn non_english_language_adds_instruction() {
        let engine = PromptEngine::new().expect("engine");
        let prompt = engine
            .render_plan(&PromptOptions {
                language: "Japanese".to_string(),
                ..options()
            })
            .expect("render");
        assert!(prompt.contains("IMPORTANT: Answer in Japanese."));
        assert!(prompt.contains("planning mode"));
    }

    #[test]
    fn appended_prompt_closes_both_variants() {
        let engine = PromptEngine::new().expect("engine");
        let opts = PromptOptions {
            append: Some("  Always cite file paths.  ".to_string()),
            ..options()
        };
        for prompt in [
            engine.render_system(&opts).expect("system"),
            engine.render_plan(&opts).expect("plan"),
        ] {
            assert!(prompt.ends_with("Always cite file paths."));
        }
    }
}
