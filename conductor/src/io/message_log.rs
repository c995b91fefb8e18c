//! Append-only session message log (`<id>.jsonl`).

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use crate::core::types::Message;
use crate::io::paths::{AgentPaths, validate_session_id};

/// Durable append-only message log keyed by session id.
pub trait MessageLog {
    /// Append `message`; returns only once the record is durable.
    fn append(&mut self, session_id: &str, message: &Message) -> Result<()>;
}

#[derive(Serialize)]
struct LogRecord<'a> {
    session_id: &'a str,
    #[serde(flatten)]
    message: &'a Message,
}

/// One JSON object per line under the sessions directory.
#[derive(Debug, Clone)]
pub struct JsonlMessageLog {
    paths: AgentPaths,
}

impl JsonlMessageLog {
    pub fn new(paths: AgentPaths) -> Self {
        Self { paths }
    }

    pub fn path_for(&self, session_id: &str) -> PathBuf {
        self.paths.session_log_path(session_id)
    }
}

impl MessageLog for JsonlMessageLog {
    fn append(&mut self, session_id: &str, message: &Message) -> Result<()> {
        validate_session_id(session_id)?;
        let path = self.path_for(session_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create log dir {}", parent.display()))?;
        }
        let mut line = serde_json::to_string(&LogRecord {
            session_id,
            message,
        })
        .context("serialize message log record")?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open message log {}", path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("append message log {}", path.display()))?;
        file.sync_data()
            .with_context(|| format!("sync message log {}", path.display()))?;
        debug!(session_id, uuid = %message.uuid, role = ?message.role, "message logged");
        Ok(())
    }
}

/// Read back a session's logged messages in append order.
pub fn read_message_log(paths: &AgentPaths, session_id: &str) -> Result<Vec<Message>> {
    validate_session_id(session_id)?;
    let path = paths.session_log_path(session_id);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents =
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(index, line)| {
            serde_json::from_str::<Message>(line)
                .with_context(|| format!("parse {} line {}", path.display(), index + 1))
        })
        .collect()
}
