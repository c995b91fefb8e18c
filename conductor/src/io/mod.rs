//! Side-effecting collaborators: configuration, durable stores and logs, and
//! the trait seams for the execution engine, tools and models.

pub mod approval_store;
pub mod config;
pub mod engine;
pub mod message_log;
pub mod model;
pub mod paths;
pub mod prompt;
pub mod request_log;
pub mod session_store;
pub mod tools;
