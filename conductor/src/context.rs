//! Explicit per-process context handle.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use tracing::debug;

use crate::io::config::{AgentConfig, ConfigOverrides, load_config};
use crate::io::paths::AgentPaths;

pub const DEFAULT_PRODUCT_NAME: &str = "conductor";

#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub cwd: PathBuf,
    pub product_name: String,
    pub version: String,
    pub overrides: ConfigOverrides,
}

impl ContextOptions {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            product_name: DEFAULT_PRODUCT_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            overrides: ConfigOverrides::default(),
        }
    }
}

/// Resolved configuration and layout, passed explicitly to every component.
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub cwd: PathBuf,
    pub product_name: String,
    pub version: String,
    pub config: AgentConfig,
    pub paths: AgentPaths,
}

impl AgentContext {
    /// Load `.<product>/config.toml` under `cwd` and layer the overrides.
    pub fn create(options: ContextOptions) -> Result<Self> {
        let product_name = options.product_name.to_lowercase();
        let paths = AgentPaths::new(&options.cwd, &product_name);
        let mut config = load_config(&paths.config_path)?;
        options.overrides.apply(&mut config);
        config
            .validate()
            .context("validate config with overrides applied")?;
        debug!(cwd = %options.cwd.display(), product = %product_name, "context created");
        Ok(Self {
            cwd: options.cwd,
            product_name,
            version: options.version,
            config,
            paths,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ApprovalMode;
    use crate::io::config::write_config;

    #[test]
    fn overrides_layer_on_top_of_file_config() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = AgentPaths::new(temp.path(), DEFAULT_PRODUCT_NAME);
        write_config(
            &paths.config_path,
            &AgentConfig {
                model: Some("file-model".to_string()),
                plan_model: Some("file-plan".to_string()),
                ..AgentConfig::default()
            },
        )
        .expect("write config");

        let mut options = ContextOptions::new(temp.path());
        options.overrides.model = Some("cli-model".to_string());
        options.overrides.approval_mode = Some(ApprovalMode::AutoEdit);
        let context = AgentContext::create(options).expect("context");

        assert_eq!(context.config.model.as_deref(), Some("cli-model"));
        assert_eq!(context.config.plan_model.as_deref(), Some("file-plan"));
        assert_eq!(context.config.approval_mode, ApprovalMode::AutoEdit);
        assert_eq!(context.paths, paths);
    }

    #[test]
    fn empty_override_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut options = ContextOptions::new(temp.path());
        options.overrides.model = Some(String::new());
        assert!(AgentContext::create(options).is_err());
    }
}
