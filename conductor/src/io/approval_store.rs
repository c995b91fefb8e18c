//! Persisted per-session approval policy (`<id>.policy.toml`).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::core::approval::SessionApprovalPolicy;
use crate::core::types::ApprovalMode;
use crate::io::config::write_atomic;
use crate::io::paths::{AgentPaths, validate_session_id};

/// Source of the current session policy.
///
/// Implementations are re-read on every approval decision, so edits made
/// mid-session take effect on the next tool call.
pub trait ApprovalPolicySource {
    fn snapshot(&self) -> Result<SessionApprovalPolicy>;
}

/// Fixed in-memory policy.
impl ApprovalPolicySource for SessionApprovalPolicy {
    fn snapshot(&self) -> Result<SessionApprovalPolicy> {
        Ok(self.clone())
    }
}

/// Read a fresh snapshot, degrading to the empty policy on failure.
pub fn snapshot_or_default(source: &dyn ApprovalPolicySource) -> SessionApprovalPolicy {
    source.snapshot().unwrap_or_else(|err| {
        warn!(error = %format!("{err:#}"), "session policy unreadable; using empty policy");
        SessionApprovalPolicy::default()
    })
}

/// TOML-backed policy for one session.
#[derive(Debug, Clone)]
pub struct FilePolicyStore {
    path: PathBuf,
}

impl FilePolicyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_session(paths: &AgentPaths, session_id: &str) -> Result<Self> {
        validate_session_id(session_id)?;
        Ok(Self::new(paths.session_policy_path(session_id)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the policy; a missing file is the empty policy.
    pub fn load(&self) -> Result<SessionApprovalPolicy> {
        if !self.path.exists() {
            return Ok(SessionApprovalPolicy::default());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read session policy {}", self.path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("parse session policy {}", self.path.display()))
    }

    pub fn save(&self, policy: &SessionApprovalPolicy) -> Result<()> {
        let mut buf = toml::to_string_pretty(policy).context("serialize session policy")?;
        buf.push('\n');
        write_atomic(&self.path, &buf)
    }

    /// Set or clear the session approval-mode override.
    pub fn set_mode_override(&self, mode: Option<ApprovalMode>) -> Result<SessionApprovalPolicy> {
        self.update(|policy| policy.approval_mode_override = mode)
    }

    /// Add `tool` to the session allow-list.
    pub fn approve_tool(&self, tool: &str) -> Result<SessionApprovalPolicy> {
        self.update(|policy| {
            policy.pre_approved_tools.insert(tool.to_string());
        })
    }

    /// Remove `tool` from the session allow-list.
    pub fn revoke_tool(&self, tool: &str) -> Result<SessionApprovalPolicy> {
        self.update(|policy| {
            policy.pre_approved_tools.remove(tool);
        })
    }

    fn update(&self, edit: impl FnOnce(&mut SessionApprovalPolicy)) -> Result<SessionApprovalPolicy> {
        let mut policy = self.load()?;
        edit(&mut policy);
        self.save(&policy)?;
        debug!(
            path = %self.path.display(),
            mode_override = ?policy.approval_mode_override,
            tools = policy.pre_approved_tools.len(),
            "session policy updated"
        );
        Ok(policy)
    }
}

impl ApprovalPolicySource for FilePolicyStore {
    fn snapshot(&self) -> Result<SessionApprovalPolicy> {
        self.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty_policy() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FilePolicyStore::new(temp.path().join("s.policy.toml"));
        assert_eq!(store.snapshot().expect("snapshot"), SessionApprovalPolicy::default());
    }

    #[test]
    fn mutations_are_visible_to_the_next_snapshot() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FilePolicyStore::new(temp.path().join("s.policy.toml"));

        store.approve_tool("bash").expect("approve");
        store
            .set_mode_override(Some(ApprovalMode::AutoEdit))
            .expect("override");
        let policy = store.snapshot().expect("snapshot");
        assert!(policy.is_pre_approved("bash"));
        assert_eq!(policy.approval_mode_override, Some(ApprovalMode::AutoEdit));

        store.revoke_tool("bash").expect("revoke");
        store.set_mode_override(None).expect("clear");
        assert_eq!(store.snapshot().expect("snapshot"), SessionApprovalPolicy::default());
    }

    #[test]
    fn policy_file_uses_camel_case_modes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("s.policy.toml");
        fs::write(
            &path,
            "approval_mode_override = \"autoEdit\"\npre_approved_tools = [\"edit\"]\n",
        )
        .expect("write");
        let policy = FilePolicyStore::new(&path).snapshot().expect("snapshot");
        assert_eq!(policy.approval_mode_override, Some(ApprovalMode::AutoEdit));
        assert!(policy.is_pre_approved("edit"));
    }

    #[test]
    fn unreadable_policy_degrades_to_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("s.policy.toml");
        fs::write(&path, "pre_approved_tools = 7\n").expect("write");
        let store = FilePolicyStore::new(&path);
        assert!(store.snapshot().is_err());
        assert_eq!(snapshot_or_default(&store), SessionApprovalPolicy::default());
    }
}
