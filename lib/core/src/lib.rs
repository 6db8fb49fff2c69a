//! Core domain types for the nodeflow workflow platform.
//!
//! This crate provides the identifier types and the `Result` alias shared
//! by the execution engine, the node executors, and the server.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{CredentialId, ExecutionId, ParseIdError, TriggerEventId, UserId, WorkflowId};
