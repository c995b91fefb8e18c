//! Task execution and tool-approval orchestration for a coding agent.
//!
//! One user request becomes one fully configured model turn: the task kind
//! selects tools, prompt and model; the branch-capable history is flattened
//! into the model input; every tool call the model asks for passes a
//! default-deny approval policy; and the new history is committed only when
//! the whole turn succeeded. The architecture keeps a strict split:
//!
//! - **[`core`]**: Pure, deterministic logic (history, assembly, approval rules).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting collaborators (config, stores, logs) and the
//!   trait seams for the execution engine, tools and models.
//!
//! Orchestration modules ([`environment`], [`driver`], [`task`], [`service`])
//! coordinate core logic with I/O.

pub mod callbacks;
pub mod context;
pub mod core;
pub mod driver;
pub mod environment;
pub mod io;
pub mod logging;
pub mod service;
pub mod task;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
