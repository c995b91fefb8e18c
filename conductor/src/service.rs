//! Session-bound façade over the task pipeline.

use anyhow::Result;
use tracing::info;

use crate::callbacks::TaskCallbacks;
use crate::context::{AgentContext, ContextOptions};
use crate::core::history::ConversationHistory;
use crate::core::types::TaskResult;
use crate::io::approval_store::FilePolicyStore;
use crate::io::engine::ExecutionEngine;
use crate::io::message_log::JsonlMessageLog;
use crate::io::model::ModelResolver;
use crate::io::request_log::JsonlRequestLog;
use crate::io::session_store::{FileSessionStore, SessionStore};
use crate::io::tools::ToolResolver;
use crate::task::{Collaborators, TaskRequest, execute_task};

#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub context: ContextOptions,
    /// Resume this session instead of starting a new one.
    pub session_id: Option<String>,
}

/// One session with file-backed history, logs and approval policy.
pub struct AgentService<E, T, M> {
    context: AgentContext,
    session: FileSessionStore,
    engine: E,
    tools: T,
    models: M,
    message_log: JsonlMessageLog,
    request_log: JsonlRequestLog,
    policy: FilePolicyStore,
}

impl<E: ExecutionEngine, T: ToolResolver, M: ModelResolver> AgentService<E, T, M> {
    pub fn open(options: ServiceOptions, engine: E, tools: T, models: M) -> Result<Self> {
        let context = AgentContext::create(options.context)?;
        let session = match &options.session_id {
            Some(id) => FileSessionStore::open_or_create(&context.paths, id)?,
            None => FileSessionStore::create(&context.paths),
        };
        let policy = FilePolicyStore::for_session(&context.paths, session.id())?;
        info!(session_id = %session.id(), resumed = options.session_id.is_some(), "service opened");
        Ok(Self {
            message_log: JsonlMessageLog::new(context.paths.clone()),
            request_log: JsonlRequestLog::new(context.paths.clone()),
            context,
            session,
            engine,
            tools,
            models,
            policy,
        })
    }

    pub fn session_id(&self) -> &str {
        self.session.id()
    }

    pub fn context(&self) -> &AgentContext {
        &self.context
    }

    pub fn history(&self) -> &ConversationHistory {
        self.session.history()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// The session's approval policy; edits apply to the next tool call.
    pub fn policy(&self) -> &FilePolicyStore {
        &self.policy
    }

    /// Full-capability task continuing from the committed tip.
    pub fn send(&mut self, message: &str, callbacks: &mut TaskCallbacks<'_>) -> TaskResult {
        self.run(TaskRequest::send(message), callbacks)
    }

    /// Read-only planning task continuing from the committed tip.
    pub fn plan(&mut self, message: &str, callbacks: &mut TaskCallbacks<'_>) -> TaskResult {
        self.run(TaskRequest::plan(message), callbacks)
    }

    /// Run an arbitrary request, e.g. one branching from an earlier message.
    pub fn run(&mut self, request: TaskRequest, callbacks: &mut TaskCallbacks<'_>) -> TaskResult {
        execute_task(
            request,
            &self.context,
            &mut self.session,
            Collaborators {
                engine: &self.engine,
                tools: &self.tools,
                models: &self.models,
                message_log: &mut self.message_log,
                request_log: &mut self.request_log,
                policy: &self.policy,
            },
            callbacks,
        )
    }
}
