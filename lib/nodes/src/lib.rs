//! Node executors for nodeflow.
//!
//! Every [`NodeType`] has exactly one executor here; [`standard_registry`]
//! builds the table the run driver uses.

pub mod credential;
pub mod http;
pub mod openrouter;
pub mod passthrough;
pub mod telegram;

pub use credential::{CredentialError, CredentialStore, InMemoryCredentialStore};
pub use http::HttpRequestExecutor;
pub use openrouter::{OpenRouterConfig, OpenRouterExecutor};
pub use passthrough::PassThroughExecutor;
pub use telegram::{TelegramConfig, TelegramTriggerExecutor};

use nodeflow_workflow::{ExecutorRegistry, NodeType};
use std::sync::Arc;

/// Dependencies of the standard executors.
pub struct NodeDependencies {
    /// Shared HTTP client.
    pub client: reqwest::Client,
    /// Credential secrets for authenticated APIs.
    pub credentials: Arc<dyn CredentialStore>,
    /// OpenRouter settings.
    pub openrouter: OpenRouterConfig,
    /// Telegram Bot API settings.
    pub telegram: TelegramConfig,
}

/// Builds the registry with an executor for every node type.
#[must_use]
pub fn standard_registry(deps: NodeDependencies) -> ExecutorRegistry {
    let mut builder = ExecutorRegistry::builder()
        .register(
            NodeType::HttpRequest,
            HttpRequestExecutor::new(deps.client.clone()),
        )
        .register(
            NodeType::OpenrouterNode,
            OpenRouterExecutor::new(deps.client.clone(), deps.credentials, &deps.openrouter),
        )
        .register(
            NodeType::TelegramTrigger,
            TelegramTriggerExecutor::new(deps.client, &deps.telegram),
        );

    for node_type in NodeType::ALL {
        if let Some(executor) = PassThroughExecutor::for_type(node_type) {
            builder = builder.register(node_type, executor);
        }
    }

    builder.build()
}

#[cfg(test)]
pub(crate) mod test_support {
    use nodeflow_core::TriggerEventId;
    use nodeflow_workflow::{
        DurableStepRunner, ExecutionContext, InMemoryStepStore, Node, NodeError, NodeExecutor,
        NodeInvocation, NodeStatus, RecordingStatusPublisher, RetryPolicy,
        status::StatusReporter,
    };
    use std::sync::Arc;

    /// Serves `router` on an ephemeral local port and returns its base URL.
    pub async fn serve(router: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("test server");
        });
        format!("http://{addr}")
    }

    /// Runs single nodes against in-memory step and status stores.
    pub struct NodeHarness {
        pub steps: Arc<InMemoryStepStore>,
        pub status: RecordingStatusPublisher,
        retry: RetryPolicy,
    }

    impl NodeHarness {
        pub fn new() -> Self {
            Self::with_retry(RetryPolicy::NONE)
        }

        pub fn with_retry(retry: RetryPolicy) -> Self {
            Self {
                steps: Arc::new(InMemoryStepStore::new()),
                status: RecordingStatusPublisher::new(),
                retry,
            }
        }

        pub async fn run(
            &self,
            executor: &dyn NodeExecutor,
            node: &Node,
            context: &ExecutionContext,
        ) -> Result<ExecutionContext, NodeError> {
            let steps = DurableStepRunner::new(
                self.steps.clone(),
                TriggerEventId::new(),
                node.id.clone(),
                self.retry,
            );
            executor
                .execute(NodeInvocation {
                    node,
                    context,
                    steps: &steps,
                    status: StatusReporter::new(&self.status, node.node_type, &node.id),
                })
                .await
        }

        pub fn statuses(&self, node_id: &str) -> Vec<NodeStatus> {
            self.status.statuses_for(node_id)
        }

        pub fn saved_steps(&self) -> usize {
            self.steps.len()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_node_type_has_an_executor() {
        let registry = standard_registry(NodeDependencies {
            client: reqwest::Client::new(),
            credentials: Arc::new(InMemoryCredentialStore::new()),
            openrouter: OpenRouterConfig::default(),
            telegram: TelegramConfig::default(),
        });

        assert!(registry.missing_types().is_empty());
        assert_eq!(registry.len(), NodeType::ALL.len());
    }
}
