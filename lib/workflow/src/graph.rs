//! Workflow graph implementation using petgraph.
//!
//! A [`WorkflowGraph`] is built once per run from the persisted nodes and
//! connections. Building it validates the structure: node ids must be unique
//! and every connection must reference nodes of the same workflow. Nodes and
//! edges keep their input order as petgraph indices, which the sorter relies
//! on for deterministic tie-breaking.

use crate::edge::Connection;
use crate::error::GraphError;
use crate::node::{Node, NodeId};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

/// A validated workflow graph.
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    graph: DiGraph<Node, Connection>,
    /// Map from NodeId to petgraph's NodeIndex for O(1) lookup.
    node_index_map: HashMap<NodeId, NodeIndex>,
}

impl WorkflowGraph {
    /// Builds a graph from nodes and connections.
    ///
    /// # Errors
    ///
    /// Returns an error if two nodes share an id or a connection references
    /// a node that is not in `nodes`.
    pub fn from_parts(
        nodes: impl IntoIterator<Item = Node>,
        connections: impl IntoIterator<Item = Connection>,
    ) -> Result<Self, GraphError> {
        let mut graph = DiGraph::new();
        let mut node_index_map = HashMap::new();

        for node in nodes {
            let node_id = node.id.clone();
            if node_index_map.contains_key(&node_id) {
                return Err(GraphError::DuplicateNode { node_id });
            }
            let index = graph.add_node(node);
            node_index_map.insert(node_id, index);
        }

        for connection in connections {
            let source = Self::endpoint(&node_index_map, &connection, &connection.source)?;
            let target = Self::endpoint(&node_index_map, &connection, &connection.target)?;
            graph.add_edge(source, target, connection);
        }

        Ok(Self {
            graph,
            node_index_map,
        })
    }

    fn endpoint(
        node_index_map: &HashMap<NodeId, NodeIndex>,
        connection: &Connection,
        node_id: &NodeId,
    ) -> Result<NodeIndex, GraphError> {
        node_index_map
            .get(node_id)
            .copied()
            .ok_or_else(|| GraphError::UnknownConnectionEndpoint {
                source: connection.source.clone(),
                target: connection.target.clone(),
                missing: node_id.clone(),
            })
    }

    /// Returns a reference to a node by its ID.
    #[must_use]
    pub fn get_node(&self, node_id: &NodeId) -> Option<&Node> {
        let index = self.node_index_map.get(node_id)?;
        self.graph.node_weight(*index)
    }

    /// Returns all nodes in input order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// Returns the number of nodes in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of connections in the graph.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns true if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Returns nodes that have no incoming connections, in input order.
    /// Initial markers are skipped.
    pub fn roots(&self) -> Vec<&Node> {
        self.graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .edges_directed(idx, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .filter_map(|idx| self.graph.node_weight(idx))
            .filter(|node| !node.node_type.is_initial_marker())
            .collect()
    }

    /// Returns the direct downstream nodes of a node.
    pub fn successors(&self, node_id: &NodeId) -> Vec<&Node> {
        self.neighbors(node_id, Direction::Outgoing)
    }

    /// Returns the direct upstream nodes of a node.
    pub fn predecessors(&self, node_id: &NodeId) -> Vec<&Node> {
        self.neighbors(node_id, Direction::Incoming)
    }

    fn neighbors(&self, node_id: &NodeId, direction: Direction) -> Vec<&Node> {
        let Some(&index) = self.node_index_map.get(node_id) else {
            return Vec::new();
        };

        let mut edges: Vec<_> = self.graph.edges_directed(index, direction).collect();
        edges.sort_by_key(|edge| edge.id());
        edges
            .into_iter()
            .filter_map(|edge| {
                let other = match direction {
                    Direction::Outgoing => edge.target(),
                    Direction::Incoming => edge.source(),
                };
                self.graph.node_weight(other)
            })
            .collect()
    }

    pub(crate) fn inner(&self) -> &DiGraph<Node, Connection> {
        &self.graph
    }
}
