//! Structured per-request logs (`requests/<request_id>.jsonl`).

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::core::types::StreamResult;
use crate::io::paths::AgentPaths;

/// Durable per-request log keyed by request id.
pub trait RequestLog {
    fn log_metadata(&mut self, session_id: &str, result: &StreamResult) -> Result<()>;

    fn log_chunk(&mut self, session_id: &str, request_id: &str, chunk: &Value) -> Result<()>;
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum RequestRecord<'a> {
    Metadata {
        session_id: &'a str,
        timestamp: String,
        #[serde(flatten)]
        result: &'a StreamResult,
    },
    Chunk {
        session_id: &'a str,
        request_id: &'a str,
        timestamp: String,
        chunk: &'a Value,
    },
}

#[derive(Debug, Clone)]
pub struct JsonlRequestLog {
    paths: AgentPaths,
}

impl JsonlRequestLog {
    pub fn new(paths: AgentPaths) -> Self {
        Self { paths }
    }

    pub fn path_for(&self, request_id: &str) -> PathBuf {
        self.paths.request_log_path(request_id)
    }

    fn append(&self, request_id: &str, record: &RequestRecord<'_>) -> Result<()> {
        let path = self.path_for(request_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create request log dir {}", parent.display()))?;
        }
        let mut line = serde_json::to_string(record).context("serialize request log record")?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open request log {}", path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("append request log {}", path.display()))?;
        Ok(())
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

impl RequestLog for JsonlRequestLog {
    fn log_metadata(&mut self, session_id: &str, result: &StreamResult) -> Result<()> {
        debug!(session_id, request_id = %result.request_id, model = %result.model, "request metadata");
        self.append(
            &result.request_id,
            &RequestRecord::Metadata {
                session_id,
                timestamp: now(),
                result,
            },
        )
    }

    fn log_chunk(&mut self, session_id: &str, request_id: &str, chunk: &Value) -> Result<()> {
        self.append(
            request_id,
            &RequestRecord::Chunk {
                session_id,
                request_id,
                timestamp: now(),
                chunk,
            },
        )
    }
}
