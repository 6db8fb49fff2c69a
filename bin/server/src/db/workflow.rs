//! Workflow definitions as saved by the editor.

use super::decode_error;
use async_trait::async_trait;
use nodeflow_core::{UserId, WorkflowId};
use nodeflow_workflow::{Connection, Node, NodeId, NodeType, SourceError, Workflow, WorkflowSource};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use tracing::instrument;

/// Row type for workflow queries.
#[derive(FromRow)]
struct WorkflowRow {
    id: String,
    name: String,
    owner_id: String,
    signing_material: Option<JsonValue>,
}

impl WorkflowRow {
    fn try_into_workflow(
        self,
        nodes: Vec<Node>,
        connections: Vec<Connection>,
    ) -> Result<Workflow, sqlx::Error> {
        let id = WorkflowId::from_str(&self.id)
            .map_err(|e| decode_error("workflow id", &self.id, e))?;
        let owner_id = UserId::from_str(&self.owner_id)
            .map_err(|e| decode_error("owner id", &self.owner_id, e))?;

        Ok(Workflow {
            id,
            name: self.name,
            owner_id,
            signing_material: self.signing_material,
            nodes,
            connections,
        })
    }
}

#[derive(FromRow)]
struct NodeRow {
    id: String,
    node_type: String,
    data: JsonValue,
}

impl NodeRow {
    fn try_into_node(self) -> Result<Node, SourceError> {
        let node_type = NodeType::from_str(&self.node_type).map_err(|e| {
            SourceError::UnknownNodeType {
                node_id: self.id.clone(),
                tag: e.tag,
            }
        })?;
        let data = match self.data {
            JsonValue::Object(map) => map,
            _ => Default::default(),
        };

        Ok(Node {
            id: NodeId::new(self.id),
            node_type,
            data,
        })
    }
}

#[derive(FromRow)]
struct ConnectionRow {
    source_node_id: String,
    target_node_id: String,
    source_handle: Option<String>,
    target_handle: Option<String>,
}

impl From<ConnectionRow> for Connection {
    fn from(row: ConnectionRow) -> Self {
        Self {
            source: NodeId::new(row.source_node_id),
            target: NodeId::new(row.target_node_id),
            source_handle: row.source_handle,
            target_handle: row.target_handle,
        }
    }
}

fn load_failed(e: sqlx::Error) -> SourceError {
    SourceError::LoadFailed {
        message: e.to_string(),
    }
}

/// Loads workflows with their nodes and connections.
#[derive(Clone)]
pub struct PgWorkflowSource {
    pool: PgPool,
}

impl PgWorkflowSource {
    /// Creates a new source.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkflowSource for PgWorkflowSource {
    #[instrument(skip(self), fields(workflow_id = %workflow_id))]
    async fn load(&self, workflow_id: WorkflowId) -> Result<Option<Workflow>, SourceError> {
        let id = workflow_id.to_string();

        let row: Option<WorkflowRow> = sqlx::query_as(
            r#"
            SELECT id, name, owner_id, signing_material
            FROM workflows
            WHERE id = $1
            "#,
        )
        .bind(&id)
        .fetch_optional(&self.pool)
        .await
        .map_err(load_failed)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let node_rows: Vec<NodeRow> = sqlx::query_as(
            r#"
            SELECT id, node_type, data
            FROM nodes
            WHERE workflow_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await
        .map_err(load_failed)?;

        let connection_rows: Vec<ConnectionRow> = sqlx::query_as(
            r#"
            SELECT source_node_id, target_node_id, source_handle, target_handle
            FROM connections
            WHERE workflow_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await
        .map_err(load_failed)?;

        let nodes = node_rows
            .into_iter()
            .map(NodeRow::try_into_node)
            .collect::<Result<Vec<_>, _>>()?;
        let connections = connection_rows.into_iter().map(Connection::from).collect();

        row.try_into_workflow(nodes, connections)
            .map(Some)
            .map_err(load_failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_node_types_are_reported() {
        let row = NodeRow {
            id: "n1".to_string(),
            node_type: "SLACK_NODE".to_string(),
            data: json!({}),
        };

        assert_eq!(
            row.try_into_node().err(),
            Some(SourceError::UnknownNodeType {
                node_id: "n1".to_string(),
                tag: "SLACK_NODE".to_string(),
            })
        );
    }

    #[test]
    fn node_rows_keep_their_data() {
        let row = NodeRow {
            id: "n2".to_string(),
            node_type: "HTTP_REQUEST".to_string(),
            data: json!({ "variableName": "resp", "endpoint": "https://example.com" }),
        };

        let node = row.try_into_node().expect("valid node");
        assert_eq!(node.node_type, NodeType::HttpRequest);
        assert_eq!(node.output_key(), Some("resp"));
    }

    #[test]
    fn non_object_data_becomes_empty() {
        let row = NodeRow {
            id: "n3".to_string(),
            node_type: "INITIAL".to_string(),
            data: JsonValue::Null,
        };

        assert!(row.try_into_node().expect("valid node").data.is_empty());
    }

    #[test]
    fn workflow_rows_reject_bad_ids() {
        let row = WorkflowRow {
            id: "garbage".to_string(),
            name: "w".to_string(),
            owner_id: UserId::new().to_string(),
            signing_material: None,
        };

        assert!(row.try_into_workflow(Vec::new(), Vec::new()).is_err());
    }
}
