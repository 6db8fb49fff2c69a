//! Connections between workflow nodes.
//!
//! A connection is a directed edge from a source node to a target node. The
//! optional handles name the output/input used when a node exposes several;
//! the engine keeps them but does not interpret them.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};

/// A directed edge in a workflow graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    /// The upstream node.
    pub source: NodeId,
    /// The downstream node.
    pub target: NodeId,
    /// Named output on the source node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    /// Named input on the target node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl Connection {
    /// Creates a connection without handles.
    #[must_use]
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
        }
    }

    /// Sets the source and target handle names.
    #[must_use]
    pub fn with_handles(
        mut self,
        source_handle: impl Into<String>,
        target_handle: impl Into<String>,
    ) -> Self {
        self.source_handle = Some(source_handle.into());
        self.target_handle = Some(target_handle.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_optional_on_the_wire() {
        let json = serde_json::to_value(Connection::new("1", "2")).expect("serialize");
        assert_eq!(json, serde_json::json!({ "source": "1", "target": "2" }));

        let parsed: Connection = serde_json::from_value(serde_json::json!({
            "source": "1",
            "target": "2",
            "sourceHandle": "main",
            "targetHandle": "main"
        }))
        .expect("deserialize");
        assert_eq!(parsed, Connection::new("1", "2").with_handles("main", "main"));
    }
}
