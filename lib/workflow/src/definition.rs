//! Workflow definitions and where they are loaded from.

use crate::edge::Connection;
use crate::error::GraphError;
use crate::graph::WorkflowGraph;
use crate::node::Node;
use async_trait::async_trait;
use nodeflow_core::{UserId, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

/// A complete workflow definition, read once at the start of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// Unique identifier.
    pub id: WorkflowId,
    /// Display name.
    pub name: String,
    /// The owning user.
    pub owner_id: UserId,
    /// Wallet or signing material attached to the workflow. Opaque to the
    /// engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_material: Option<JsonValue>,
    /// The nodes, in persisted order.
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// The connections, in persisted order.
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl Workflow {
    /// Creates an empty workflow.
    #[must_use]
    pub fn new(name: impl Into<String>, owner_id: UserId) -> Self {
        Self {
            id: WorkflowId::new(),
            name: name.into(),
            owner_id,
            signing_material: None,
            nodes: Vec::new(),
            connections: Vec::new(),
        }
    }

    /// Adds a node.
    #[must_use]
    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Adds a connection.
    #[must_use]
    pub fn with_connection(mut self, connection: Connection) -> Self {
        self.connections.push(connection);
        self
    }

    /// Builds the validated graph of this workflow.
    ///
    /// # Errors
    ///
    /// Returns an error if the node/connection set is structurally invalid.
    pub fn graph(&self) -> Result<WorkflowGraph, GraphError> {
        WorkflowGraph::from_parts(self.nodes.iter().cloned(), self.connections.iter().cloned())
    }
}

/// Errors from loading workflows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// A stored node has a type tag the engine does not know.
    UnknownNodeType { node_id: String, tag: String },
    /// The backing store failed.
    LoadFailed { message: String },
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownNodeType { node_id, tag } => {
                write!(f, "node {node_id} has unknown type {tag}")
            }
            Self::LoadFailed { message } => write!(f, "failed to load workflow: {message}"),
        }
    }
}

impl std::error::Error for SourceError {}

/// Read access to persisted workflows.
#[async_trait]
pub trait WorkflowSource: Send + Sync {
    /// Loads a workflow with its nodes and connections.
    async fn load(&self, workflow_id: WorkflowId) -> Result<Option<Workflow>, SourceError>;
}

/// In-memory workflow source.
#[derive(Default)]
pub struct InMemoryWorkflowSource {
    workflows: Mutex<HashMap<WorkflowId, Workflow>>,
}

impl InMemoryWorkflowSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a workflow, replacing any with the same id.
    pub fn insert(&self, workflow: Workflow) {
        if let Ok(mut workflows) = self.workflows.lock() {
            workflows.insert(workflow.id, workflow);
        }
    }
}

#[async_trait]
impl WorkflowSource for InMemoryWorkflowSource {
    async fn load(&self, workflow_id: WorkflowId) -> Result<Option<Workflow>, SourceError> {
        let workflows = self.workflows.lock().map_err(|e| SourceError::LoadFailed {
            message: e.to_string(),
        })?;
        Ok(workflows.get(&workflow_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeType;

    #[test]
    fn builder_collects_nodes_and_connections() {
        let workflow = Workflow::new("Demo", UserId::new())
            .with_node(Node::new("1", NodeType::ManualTrigger))
            .with_node(Node::new("2", NodeType::HttpRequest))
            .with_connection(Connection::new("1", "2"));

        let graph = workflow.graph().expect("valid graph");
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn deserializes_with_missing_collections() {
        let owner = UserId::new();
        let id = WorkflowId::new();
        let workflow: Workflow = serde_json::from_value(serde_json::json!({
            "id": id,
            "name": "Empty",
            "ownerId": owner,
        }))
        .expect("deserialize");

        assert!(workflow.nodes.is_empty());
        assert!(workflow.connections.is_empty());
        assert!(workflow.signing_material.is_none());
    }

    #[tokio::test]
    async fn in_memory_source_loads_inserted_workflows() {
        let source = InMemoryWorkflowSource::new();
        let workflow = Workflow::new("Stored", UserId::new());
        let id = workflow.id;
        source.insert(workflow.clone());

        assert_eq!(source.load(id).await.expect("load"), Some(workflow));
        assert_eq!(source.load(WorkflowId::new()).await.expect("load"), None);
    }
}
