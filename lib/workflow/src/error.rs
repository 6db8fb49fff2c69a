//! Error types for the workflow crate.
//!
//! Errors are layered:
//! - `GraphError`: structural problems in the node/connection set
//! - `NodeError`: failures raised by a node executor, classified by retriability
//! - `RunError`: everything the run driver can fail with, wrapping the above

use crate::node::NodeId;
use nodeflow_core::WorkflowId;
use std::fmt;

/// Errors from building or ordering a workflow graph.
///
/// These are structural: retrying the same graph cannot succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Two nodes share an id.
    DuplicateNode { node_id: NodeId },
    /// A connection references a node that is not part of the workflow.
    UnknownConnectionEndpoint {
        source: NodeId,
        target: NodeId,
        missing: NodeId,
    },
    /// The graph contains at least one cycle.
    ///
    /// `unsorted` lists every node that could not be placed in the order.
    CycleDetected { unsorted: Vec<NodeId> },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateNode { node_id } => write!(f, "duplicate node id: {node_id}"),
            Self::UnknownConnectionEndpoint {
                source,
                target,
                missing,
            } => write!(
                f,
                "connection {source} -> {target} references unknown node {missing}"
            ),
            Self::CycleDetected { unsorted } => {
                let ids: Vec<&str> = unsorted.iter().map(NodeId::as_str).collect();
                write!(f, "graph contains a cycle through nodes [{}]", ids.join(", "))
            }
        }
    }
}

impl std::error::Error for GraphError {}

/// Errors raised by node executors.
///
/// The variant decides whether the durable step runner may retry the work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// Required configuration is missing or malformed. Never retried.
    Validation { message: String },
    /// Network failure, upstream outage or rate limit. Retried up to the
    /// step runner's budget.
    Transient { message: String },
    /// Anything else. Never retried.
    Internal { message: String },
}

impl NodeError {
    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a transient error.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if the step runner may retry the failed work.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Validation { message }
            | Self::Transient { message }
            | Self::Internal { message } => message,
        }
    }

    /// Returns the stable name of the error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Transient { .. } => "transient",
            Self::Internal { .. } => "internal",
        }
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind(), self.message())
    }
}

impl std::error::Error for NodeError {}

/// Errors from driving a workflow run.
///
/// Structural and node failures end the run as FAILED. Store failures are
/// infrastructure problems: the run is left as-is so the trigger event can
/// be delivered again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// The workflow referenced by the trigger event does not exist.
    WorkflowNotFound { workflow_id: WorkflowId },
    /// The graph could not be ordered.
    Graph(GraphError),
    /// A node's type has no registered executor or could not be parsed.
    UnknownNodeType { node_id: NodeId, node_type: String },
    /// A node executor failed.
    NodeFailed {
        node_id: NodeId,
        node_type: String,
        error: NodeError,
    },
    /// A persistence or transport dependency failed.
    Store { message: String },
}

impl RunError {
    /// Returns true for errors that end the run as FAILED.
    ///
    /// Store errors return false: they say nothing about the workflow.
    #[must_use]
    pub fn is_run_fatal(&self) -> bool {
        !matches!(self, Self::Store { .. })
    }

    /// Returns true for errors detected before any node runs.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::WorkflowNotFound { .. } | Self::Graph(_) | Self::UnknownNodeType { .. }
        )
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkflowNotFound { workflow_id } => {
                write!(f, "workflow not found: {workflow_id}")
            }
            Self::Graph(e) => write!(f, "invalid workflow graph: {e}"),
            Self::UnknownNodeType { node_id, node_type } => {
                write!(f, "no executor for node type {node_type} (node {node_id})")
            }
            Self::NodeFailed {
                node_id,
                node_type,
                error,
            } => write!(f, "node {node_id} ({node_type}) failed: {error}"),
            Self::Store { message } => write!(f, "store error: {message}"),
        }
    }
}

impl std::error::Error for RunError {}

impl From<GraphError> for RunError {
    fn from(e: GraphError) -> Self {
        Self::Graph(e)
    }
}
