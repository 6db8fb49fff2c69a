//! Live node status reporting.
//!
//! Executors publish `loading`, then `success` or `error`, for the node they
//! run. Events go to a topic named after the node type's channel. The engine
//! only needs the [`StatusPublisher`] capability; transports live elsewhere
//! (see `nats` for the production one).
//!
//! Status events are observability, not state: a failed publish is logged
//! and never fails the node.

use crate::node::{NodeId, NodeType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use tokio::sync::broadcast;

/// Status of a node during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// The node has started.
    Loading,
    /// The node finished successfully.
    Success,
    /// The node failed.
    Error,
}

impl NodeStatus {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// A status change for one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatusEvent {
    /// The node whose status changed.
    pub node_id: NodeId,
    /// The new status.
    pub status: NodeStatus,
}

/// A status event together with the topic it was published on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    /// The node type channel.
    pub topic: String,
    /// The event.
    pub event: NodeStatusEvent,
}

/// Error returned by a status transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishError {
    /// Description of the failure.
    pub message: String,
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status publish failed: {}", self.message)
    }
}

impl std::error::Error for PublishError {}

/// Capability to broadcast node status events.
#[async_trait]
pub trait StatusPublisher: Send + Sync {
    /// Publishes an event on a topic.
    async fn publish(&self, topic: &str, event: NodeStatusEvent) -> Result<(), PublishError>;
}

/// Publishes status for a single node on its type's topic.
#[derive(Clone, Copy)]
pub struct StatusReporter<'a> {
    publisher: &'a dyn StatusPublisher,
    topic: &'static str,
    node_id: &'a NodeId,
}

impl<'a> StatusReporter<'a> {
    /// Creates a reporter for `node_id` on `node_type`'s channel.
    #[must_use]
    pub fn new(publisher: &'a dyn StatusPublisher, node_type: NodeType, node_id: &'a NodeId) -> Self {
        Self {
            publisher,
            topic: node_type.channel(),
            node_id,
        }
    }

    /// Returns the topic events are published on.
    #[must_use]
    pub fn topic(&self) -> &'static str {
        self.topic
    }

    /// Publishes `loading`.
    pub async fn loading(&self) {
        self.report(NodeStatus::Loading).await;
    }

    /// Publishes `success`.
    pub async fn success(&self) {
        self.report(NodeStatus::Success).await;
    }

    /// Publishes `error`.
    pub async fn error(&self) {
        self.report(NodeStatus::Error).await;
    }

    async fn report(&self, status: NodeStatus) {
        let event = NodeStatusEvent {
            node_id: self.node_id.clone(),
            status,
        };
        if let Err(e) = self.publisher.publish(self.topic, event).await {
            tracing::warn!(
                error = %e,
                node_id = %self.node_id,
                topic = self.topic,
                status = status.as_str(),
                "Failed to publish node status"
            );
        }
    }
}

/// In-process event bus for status events.
///
/// Subscribers receive every message and filter by topic themselves.
/// Publishing with no subscribers succeeds.
pub struct BroadcastStatusPublisher {
    sender: broadcast::Sender<StatusMessage>,
}

impl BroadcastStatusPublisher {
    /// Creates a bus buffering up to `capacity` messages per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribes to all future messages.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StatusMessage> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl StatusPublisher for BroadcastStatusPublisher {
    async fn publish(&self, topic: &str, event: NodeStatusEvent) -> Result<(), PublishError> {
        let _ = self.sender.send(StatusMessage {
            topic: topic.to_string(),
            event,
        });
        Ok(())
    }
}

/// Status publisher that keeps every message in memory.
///
/// Useful to assert on event order in tests.
#[derive(Default)]
pub struct RecordingStatusPublisher {
    messages: Mutex<Vec<StatusMessage>>,
}

impl RecordingStatusPublisher {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded messages in publish order.
    #[must_use]
    pub fn messages(&self) -> Vec<StatusMessage> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Returns the statuses recorded for one node, in order.
    #[must_use]
    pub fn statuses_for(&self, node_id: &str) -> Vec<NodeStatus> {
        self.messages()
            .into_iter()
            .filter(|m| m.event.node_id.as_str() == node_id)
            .map(|m| m.event.status)
            .collect()
    }
}

#[async_trait]
impl StatusPublisher for RecordingStatusPublisher {
    async fn publish(&self, topic: &str, event: NodeStatusEvent) -> Result<(), PublishError> {
        let mut messages = self.messages.lock().map_err(|e| PublishError {
            message: e.to_string(),
        })?;
        messages.push(StatusMessage {
            topic: topic.to_string(),
            event,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingPublisher;

    #[async_trait]
    impl StatusPublisher for FailingPublisher {
        async fn publish(&self, _topic: &str, _event: NodeStatusEvent) -> Result<(), PublishError> {
            Err(PublishError {
                message: "transport down".to_string(),
            })
        }
    }

    #[test]
    fn event_wire_format() {
        let event = NodeStatusEvent {
            node_id: NodeId::new("n1"),
            status: NodeStatus::Loading,
        };
        assert_eq!(
            serde_json::to_value(&event).expect("serialize"),
            serde_json::json!({ "nodeId": "n1", "status": "loading" })
        );
    }

    #[tokio::test]
    async fn reporter_publishes_on_type_channel() {
        let recorder = RecordingStatusPublisher::new();
        let node_id = NodeId::new("2");
        let reporter = StatusReporter::new(&recorder, NodeType::HttpRequest, &node_id);

        reporter.loading().await;
        reporter.success().await;

        let messages = recorder.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.topic == "http-request-execution"));
        assert_eq!(
            recorder.statuses_for("2"),
            vec![NodeStatus::Loading, NodeStatus::Success]
        );
    }

    #[tokio::test]
    async fn publish_failure_is_not_fatal() {
        let node_id = NodeId::new("1");
        let reporter = StatusReporter::new(&FailingPublisher, NodeType::ManualTrigger, &node_id);
        reporter.loading().await;
        reporter.error().await;
    }

    #[tokio::test]
    async fn broadcast_delivers_to_subscribers() {
        let bus = BroadcastStatusPublisher::new(8);
        let mut receiver = bus.subscribe();

        bus.publish(
            "openrouter-node-execution",
            NodeStatusEvent {
                node_id: NodeId::new("ai"),
                status: NodeStatus::Error,
            },
        )
        .await
        .expect("publish");

        let message = receiver.recv().await.expect("message");
        assert_eq!(message.topic, "openrouter-node-execution");
        assert_eq!(message.event.status, NodeStatus::Error);
    }

    #[tokio::test]
    async fn broadcast_without_subscribers_succeeds() {
        let bus = BroadcastStatusPublisher::new(1);
        let result = bus
            .publish(
                "walrus-node-execution",
                NodeStatusEvent {
                    node_id: NodeId::new("w"),
                    status: NodeStatus::Success,
                },
            )
            .await;
        assert!(result.is_ok());
    }
}
