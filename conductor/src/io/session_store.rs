//! Durable, branch-capable session history.
//!
//! Each session persists as one JSON snapshot
//! (`.conductor/sessions/<id>.history.json`) holding every committed message
//! plus the committed path. Snapshots are rewritten atomically on every commit,
//! so readers see either the previous or the next history, never a mix.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::core::history::ConversationHistory;
use crate::core::types::Message;
use crate::io::config::write_atomic;
use crate::io::paths::{AgentPaths, session_id_from_history_file, validate_session_id};

const SNAPSHOT_VERSION: u32 = 1;

/// Owner of one session's committed history.
pub trait SessionStore {
    fn id(&self) -> &str;

    /// Committed path plus every earlier branch.
    fn history(&self) -> &ConversationHistory;

    /// Atomically swap the committed path for `messages`.
    ///
    /// Either the whole new history becomes visible or the store is left
    /// untouched.
    fn replace_history(&mut self, messages: Vec<Message>) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct HistorySnapshot {
    version: u32,
    session_id: String,
    path: Vec<String>,
    messages: Vec<Message>,
}

/// File-backed [`SessionStore`].
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    id: String,
    snapshot_path: PathBuf,
    history: ConversationHistory,
}

impl FileSessionStore {
    /// Start a new session with a fresh id. Nothing is written until the
    /// first commit.
    pub fn create(paths: &AgentPaths) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        info!(session_id = %id, "created session");
        Self {
            snapshot_path: paths.session_history_path(&id),
            id,
            history: ConversationHistory::new(),
        }
    }

    /// Open an existing session; fails when it has never been committed.
    #[instrument(skip(paths))]
    pub fn open(paths: &AgentPaths, session_id: &str) -> Result<Self> {
        validate_session_id(session_id)?;
        let snapshot_path = paths.session_history_path(session_id);
        if !snapshot_path.exists() {
            bail!("unknown session '{session_id}'");
        }
        Self::load(session_id, snapshot_path)
    }

    /// Open a session, starting an empty one under `session_id` if needed.
    pub fn open_or_create(paths: &AgentPaths, session_id: &str) -> Result<Self> {
        validate_session_id(session_id)?;
        let snapshot_path = paths.session_history_path(session_id);
        if snapshot_path.exists() {
            return Self::load(session_id, snapshot_path);
        }
        debug!(session_id, "no snapshot yet; starting empty session");
        Ok(Self {
            id: session_id.to_string(),
            snapshot_path,
            history: ConversationHistory::new(),
        })
    }

    fn load(session_id: &str, snapshot_path: PathBuf) -> Result<Self> {
        let contents = fs::read_to_string(&snapshot_path)
            .with_context(|| format!("read session history {}", snapshot_path.display()))?;
        let snapshot: HistorySnapshot = serde_json::from_str(&contents)
            .with_context(|| format!("parse session history {}", snapshot_path.display()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            bail!(
                "unsupported session history version {} in {}",
                snapshot.version,
                snapshot_path.display()
            );
        }
        if snapshot.session_id != session_id {
            bail!(
                "session history {} belongs to '{}', not '{session_id}'",
                snapshot_path.display(),
                snapshot.session_id
            );
        }
        let history = ConversationHistory::from_parts(snapshot.messages, snapshot.path)
            .with_context(|| format!("invalid session history {}", snapshot_path.display()))?;
        debug!(session_id, messages = history.len(), "session history loaded");
        Ok(Self {
            id: session_id.to_string(),
            snapshot_path,
            history,
        })
    }

    pub fn snapshot_path(&self) -> &PathBuf {
        &self.snapshot_path
    }
}

impl SessionStore for FileSessionStore {
    fn id(&self) -> &str {
        &self.id
    }

    fn history(&self) -> &ConversationHistory {
        &self.history
    }

    #[instrument(skip_all, fields(session_id = %self.id, messages = messages.len()))]
    fn replace_history(&mut self, messages: Vec<Message>) -> Result<()> {
        let mut next = self.history.clone();
        next.replace(messages)
            .with_context(|| format!("commit history for session '{}'", self.id))?;

        let snapshot = HistorySnapshot {
            version: SNAPSHOT_VERSION,
            session_id: self.id.clone(),
            path: next.path().to_vec(),
            messages: next.nodes().to_vec(),
        };
        let mut buf = serde_json::to_string_pretty(&snapshot).context("serialize session history")?;
        buf.push('\n');
        write_atomic(&self.snapshot_path, &buf)?;

        self.history = next;
        debug!("session history committed");
        Ok(())
    }
}

/// One row of `conductor sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub messages: usize,
    pub last_timestamp: Option<String>,
}

/// Summaries of every committed session, sorted by id.
pub fn list_sessions(paths: &AgentPaths) -> Result<Vec<SessionSummary>> {
    if !paths.sessions_dir.exists() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(&paths.sessions_dir)
        .with_context(|| format!("read sessions dir {}", paths.sessions_dir.display()))?;
    let mut summaries = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("read {}", paths.sessions_dir.display()))?;
        let Some(session_id) = session_id_from_history_file(&entry.path()) else {
            continue;
        };
        let store = FileSessionStore::load(&session_id, entry.path())?;
        summaries.push(SessionSummary {
            messages: store.history.len(),
            last_timestamp: store.history.last().map(|m| m.timestamp.clone()),
            session_id,
        });
    }
    summaries.sort_by(|a, b| a.session_id.cmp(&b.session_id));
    Ok(summaries)
}
