//! Node types that forward the context unchanged.
//!
//! Triggers whose payload is already in the initial data, and node types
//! whose side effects run outside the engine, still publish status and
//! record one durable step so the run history shows them.

use async_trait::async_trait;
use nodeflow_workflow::{
    ExecutionContext, NodeError, NodeExecutor, NodeInvocation, NodeType, step_fn,
};
use serde_json::Value as JsonValue;

/// Executor that returns its input context.
#[derive(Debug, Clone, Copy)]
pub struct PassThroughExecutor {
    step_name: &'static str,
}

impl PassThroughExecutor {
    /// Creates an executor recording its step as `step_name`.
    #[must_use]
    pub const fn new(step_name: &'static str) -> Self {
        Self { step_name }
    }

    /// Returns the executor for a pass-through node type, or `None` for
    /// types with their own executor.
    #[must_use]
    pub const fn for_type(node_type: NodeType) -> Option<Self> {
        let step_name = match node_type {
            NodeType::Initial | NodeType::ManualTrigger => "manual-trigger",
            NodeType::GoogleFormTrigger => "google-form-trigger",
            NodeType::FileUpload => "file-upload",
            NodeType::WalrusNodeStorage => "walrus-node",
            NodeType::OpenAgentNode => "open-agent",
            NodeType::TelegramTrigger | NodeType::HttpRequest | NodeType::OpenrouterNode => {
                return None;
            }
        };
        Some(Self::new(step_name))
    }
}

#[async_trait]
impl NodeExecutor for PassThroughExecutor {
    async fn execute(&self, invocation: NodeInvocation<'_>) -> Result<ExecutionContext, NodeError> {
        invocation
            .run_with_status(|| async {
                let snapshot = invocation.context.clone().into_json();
                let output = invocation
                    .steps
                    .run(
                        self.step_name,
                        step_fn(move || {
                            let snapshot = snapshot.clone();
                            async move { Ok(snapshot) }
                        }),
                    )
                    .await?;

                match output {
                    JsonValue::Object(map) => Ok(ExecutionContext::from(map)),
                    other => Err(NodeError::internal(format!(
                        "step '{}' returned a non-object context: {other}",
                        self.step_name
                    ))),
                }
            })
            .await
    }
}
