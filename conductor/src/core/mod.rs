//! Deterministic, pure logic for the orchestration engine.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod approval;
pub mod assemble;
pub mod history;
pub mod thinking;
pub mod types;
