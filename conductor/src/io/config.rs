//! Agent configuration stored under `.conductor/config.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::approval::UnknownToolPolicy;
use crate::core::types::ApprovalMode;

/// Agent configuration (TOML).
///
/// Meant to be edited by humans. Missing fields take the defaults below;
/// [`ConfigOverrides`] from the CLI or service caller are layered on top.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Model for `send` tasks, and the fallback for every task.
    pub model: Option<String>,

    /// Model for `plan` tasks.
    pub plan_model: Option<String>,

    /// Preferred answer language.
    pub language: String,

    pub approval_mode: ApprovalMode,

    /// Include the task-list section in the full-capability prompt.
    pub todo: bool,

    /// Let the execution engine compact long histories.
    pub auto_compact: bool,

    /// Extra text appended to every system prompt.
    pub append_system_prompt: Option<String>,

    /// Approval for tool names missing from the task's tool set.
    pub unknown_tools: UnknownToolPolicy,

    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProviderConfig {
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Environment variable holding an optional base URL.
    pub base_url_env: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url_env: Some("OPENAI_BASE_URL".to_string()),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: None,
            plan_model: None,
            language: "English".to_string(),
            approval_mode: ApprovalMode::Default,
            todo: true,
            auto_compact: true,
            append_system_prompt: None,
            unknown_tools: UnknownToolPolicy::Approve,
            provider: ProviderConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
            return Err(anyhow!("model must not be empty"));
        }
        if self.plan_model.as_deref().is_some_and(|m| m.trim().is_empty()) {
            return Err(anyhow!("plan_model must not be empty"));
        }
        if self.language.trim().is_empty() {
            return Err(anyhow!("language must not be empty"));
        }
        if self.provider.api_key_env.trim().is_empty() {
            return Err(anyhow!("provider.api_key_env must not be empty"));
        }
        if self
            .provider
            .base_url_env
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            return Err(anyhow!("provider.base_url_env must not be empty"));
        }
        Ok(())
    }
}

/// Per-invocation overrides; `None` keeps the configured value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub model: Option<String>,
    pub plan_model: Option<String>,
    pub language: Option<String>,
    pub approval_mode: Option<ApprovalMode>,
    pub todo: Option<bool>,
    pub append_system_prompt: Option<String>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut AgentConfig) {
        if let Some(model) = &self.model {
            config.model = Some(model.clone());
        }
        if let Some(plan_model) = &self.plan_model {
            config.plan_model = Some(plan_model.clone());
        }
        if let Some(language) = &self.language {
            config.language = language.clone();
        }
        if let Some(mode) = self.approval_mode {
            config.approval_mode = mode;
        }
        if let Some(todo) = self.todo {
            config.todo = todo;
        }
        if let Some(append) = &self.append_system_prompt {
            config.append_system_prompt = Some(append.clone());
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing; using defaults");
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AgentConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Write `contents` next to `path` and rename it into place.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or_else(|| "tmp".to_string(), |ext| format!("{ext}.tmp"));
    let tmp_path = path.with_extension(extension);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, AgentConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let cfg = AgentConfig {
            model: Some("glm-4.6".to_string()),
            approval_mode: ApprovalMode::AutoEdit,
            unknown_tools: UnknownToolPolicy::Confirm,
            ..AgentConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
        assert!(!temp.path().join("config.toml.tmp").exists());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "model = \"glm-4.6\"\napproval_mode = \"yolo\"\n\n[provider]\napi_key_env = \"GLM_KEY\"\n",
        )
        .expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.model.as_deref(), Some("glm-4.6"));
        assert_eq!(cfg.approval_mode, ApprovalMode::Yolo);
        assert_eq!(cfg.provider.api_key_env, "GLM_KEY");
        assert_eq!(
            cfg.provider.base_url_env.as_deref(),
            Some("OPENAI_BASE_URL")
        );
        assert!(cfg.todo);
    }

    #[test]
    fn empty_model_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "model = \"  \"\n").expect("write");
        let err = load_config(&path).expect_err("invalid");
        assert!(format!("{err:#}").contains("model must not be empty"));
    }

    #[test]
    fn overrides_replace_only_given_fields() {
        let mut cfg = AgentConfig {
            model: Some("base".to_string()),
            language: "French".to_string(),
            ..AgentConfig::default()
        };
        ConfigOverrides {
            model: Some("override".to_string()),
            approval_mode: Some(ApprovalMode::Yolo),
            ..ConfigOverrides::default()
        }
        .apply(&mut cfg);
        assert_eq!(cfg.model.as_deref(), Some("override"));
        assert_eq!(cfg.language, "French");
        assert_eq!(cfg.approval_mode, ApprovalMode::Yolo);
    }
}
