//! Canonical on-disk layout under `.<product>/`.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Result, anyhow};
use regex::Regex;

static SESSION_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,127}$").expect("valid session id regex")
});

/// Characters escaped in request-log file stems. `_` is the escape marker, and
/// a leading `.` would make the file hidden.
static UNSAFE_FILENAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\.|[^A-Za-z0-9.-]").expect("valid file stem regex"));

/// All canonical paths for one project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentPaths {
    pub root: PathBuf,
    pub product_dir: PathBuf,
    pub config_path: PathBuf,
    pub sessions_dir: PathBuf,
    pub requests_dir: PathBuf,
}

impl AgentPaths {
    pub fn new(root: impl Into<PathBuf>, product_name: &str) -> Self {
        let root = root.into();
        let product_dir = root.join(format!(".{}", product_name.to_lowercase()));
        Self {
            root,
            config_path: product_dir.join("config.toml"),
            sessions_dir: product_dir.join("sessions"),
            requests_dir: product_dir.join("requests"),
            product_dir,
        }
    }

    /// Committed history snapshot for a session.
    pub fn session_history_path(&self, session_id: &str) -> PathBuf {
        self.sessions_dir.join(format!("{session_id}.history.json"))
    }

    /// Append-only message log for a session.
    pub fn session_log_path(&self, session_id: &str) -> PathBuf {
        self.sessions_dir.join(format!("{session_id}.jsonl"))
    }

    /// Persisted approval policy for a session.
    pub fn session_policy_path(&self, session_id: &str) -> PathBuf {
        self.sessions_dir.join(format!("{session_id}.policy.toml"))
    }

    /// Structured per-request log.
    pub fn request_log_path(&self, request_id: &str) -> PathBuf {
        self.requests_dir
            .join(format!("{}.jsonl", escape_file_stem(request_id)))
    }
}

/// Reject session ids that would escape the sessions directory.
pub fn validate_session_id(session_id: &str) -> Result<()> {
    if SESSION_ID_RE.is_match(session_id) {
        Ok(())
    } else {
        Err(anyhow!(
            "invalid session id '{session_id}' (expected letters, digits, '.', '_' or '-')"
        ))
    }
}

/// Map an arbitrary id to a file stem, injectively.
///
/// Every unsafe byte becomes `_xx` (lowercase hex), so distinct ids never
/// share a log file.
pub fn escape_file_stem(raw: &str) -> String {
    if raw.is_empty() {
        return "_".to_string();
    }
    UNSAFE_FILENAME_RE
        .replace_all(raw, |caps: &regex::Captures<'_>| {
            caps[0].bytes().map(|byte| format!("_{byte:02x}")).collect::<String>()
        })
        .into_owned()
}

/// Session id recovered from a history snapshot file name.
pub(crate) fn session_id_from_history_file(path: &Path) -> Option<String> {
    path.file_name()?
        .to_str()?
        .strip_suffix(".history.json")
        .filter(|id| validate_session_id(id).is_ok())
        .map(str::to_string)
}
