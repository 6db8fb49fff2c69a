//! The node executor contract.
//!
//! Every node type is implemented as a [`NodeExecutor`]. An executor:
//! 1. publishes `loading` before any side effect,
//! 2. performs its side effects inside named durable steps,
//! 3. publishes `success` and returns the new context, or
//! 4. publishes `error` and returns the error.
//!
//! The input context is borrowed immutably; executors build the returned
//! context with [`ExecutionContext::with_output`]. [`NodeInvocation::run_with_status`]
//! takes care of steps 1, 3 and 4.

use crate::context::ExecutionContext;
use crate::error::NodeError;
use crate::node::{Node, NodeData, NodeId, NodeType, data_str};
use crate::status::StatusReporter;
use crate::step::StepRunner;
use async_trait::async_trait;
use std::future::Future;

/// Everything an executor receives for one node.
#[derive(Clone, Copy)]
pub struct NodeInvocation<'a> {
    /// The node being executed.
    pub node: &'a Node,
    /// The context produced by the previous node.
    pub context: &'a ExecutionContext,
    /// Durable step runner scoped to this node.
    pub steps: &'a dyn StepRunner,
    /// Status reporter scoped to this node.
    pub status: StatusReporter<'a>,
}

impl<'a> NodeInvocation<'a> {
    /// Returns the node id.
    #[must_use]
    pub fn node_id(&self) -> &'a NodeId {
        &self.node.id
    }

    /// Returns the node type.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        self.node.node_type
    }

    /// Returns the node configuration.
    #[must_use]
    pub fn data(&self) -> &'a NodeData {
        &self.node.data
    }

    /// Returns a required, non-empty string field of the configuration.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the field if it is absent or empty.
    pub fn require_str(&self, field: &str) -> Result<&'a str, NodeError> {
        data_str(&self.node.data, field).ok_or_else(|| {
            NodeError::validation(format!(
                "{} node {}: '{field}' is required",
                self.node.node_type, self.node.id
            ))
        })
    }

    /// Returns an optional, non-empty string field of the configuration.
    #[must_use]
    pub fn optional_str(&self, field: &str) -> Option<&'a str> {
        data_str(&self.node.data, field)
    }

    /// Publishes `loading`, runs `work`, then publishes `success` or `error`
    /// depending on the outcome. Errors are returned unchanged.
    pub async fn run_with_status<F, Fut>(&self, work: F) -> Result<ExecutionContext, NodeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ExecutionContext, NodeError>>,
    {
        self.status.loading().await;
        match work().await {
            Ok(context) => {
                self.status.success().await;
                Ok(context)
            }
            Err(error) => {
                tracing::debug!(
                    node_id = %self.node.id,
                    node_type = %self.node.node_type,
                    error = %error,
                    "Node failed"
                );
                self.status.error().await;
                Err(error)
            }
        }
    }
}

/// Runtime behaviour of a node type.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Executes the node and returns the context for the next node.
    async fn execute(&self, invocation: NodeInvocation<'_>) -> Result<ExecutionContext, NodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{NodeStatus, RecordingStatusPublisher};
    use crate::step::{DurableStepRunner, InMemoryStepStore};
    use crate::retry::RetryPolicy;
    use nodeflow_core::TriggerEventId;
    use serde_json::json;
    use std::sync::Arc;

    fn steps(node: &Node) -> DurableStepRunner {
        DurableStepRunner::new(
            Arc::new(InMemoryStepStore::new()),
            TriggerEventId::new(),
            node.id.clone(),
            RetryPolicy::NONE,
        )
    }

    #[tokio::test]
    async fn run_with_status_reports_success() {
        let node = Node::new("1", NodeType::ManualTrigger);
        let ctx = ExecutionContext::new();
        let recorder = RecordingStatusPublisher::new();
        let runner = steps(&node);
        let invocation = NodeInvocation {
            node: &node,
            context: &ctx,
            steps: &runner,
            status: StatusReporter::new(&recorder, node.node_type, &node.id),
        };

        let result = invocation
            .run_with_status(|| async { Ok(ctx.with_output("k", json!(1))) })
            .await
            .expect("success");

        assert_eq!(result.get("k"), Some(&json!(1)));
        assert!(ctx.is_empty());
        assert_eq!(
            recorder.statuses_for("1"),
            vec![NodeStatus::Loading, NodeStatus::Success]
        );
    }

    #[tokio::test]
    async fn run_with_status_reports_error_and_propagates() {
        let node = Node::new("2", NodeType::HttpRequest);
        let ctx = ExecutionContext::new();
        let recorder = RecordingStatusPublisher::new();
        let runner = steps(&node);
        let invocation = NodeInvocation {
            node: &node,
            context: &ctx,
            steps: &runner,
            status: StatusReporter::new(&recorder, node.node_type, &node.id),
        };

        let result = invocation
            .run_with_status(|| async { Err(NodeError::transient("timeout")) })
            .await;

        assert_eq!(result, Err(NodeError::transient("timeout")));
        assert_eq!(
            recorder.statuses_for("2"),
            vec![NodeStatus::Loading, NodeStatus::Error]
        );
    }

    #[test]
    fn require_str_reports_missing_field() {
        let node = Node::new("3", NodeType::HttpRequest).with_data("endpoint", "");
        let ctx = ExecutionContext::new();
        let recorder = RecordingStatusPublisher::new();
        let runner = steps(&node);
        let invocation = NodeInvocation {
            node: &node,
            context: &ctx,
            steps: &runner,
            status: StatusReporter::new(&recorder, node.node_type, &node.id),
        };

        let err = invocation.require_str("endpoint").unwrap_err();
        assert!(matches!(err, NodeError::Validation { .. }));
        assert!(err.message().contains("'endpoint' is required"));
    }
}
