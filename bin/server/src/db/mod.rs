//! Postgres-backed stores for nodeflow.
//!
//! This module provides data access for:
//! - Workflow definitions (nodes and connections)
//! - Execution records, one per trigger event
//! - Durable step outputs
//! - Credential secrets

pub mod credential;
pub mod execution;
pub mod step;
pub mod workflow;

pub use credential::PgCredentialStore;
pub use execution::PgExecutionStore;
pub use step::PgStepStore;
pub use workflow::PgWorkflowSource;

/// Builds the error a row conversion reports for an unparseable column.
fn decode_error(column: &str, value: &str, reason: impl std::fmt::Display) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("invalid {column} '{value}': {reason}"),
    )))
}
