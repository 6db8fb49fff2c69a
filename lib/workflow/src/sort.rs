//! Topological ordering of workflow graphs.
//!
//! Kahn's algorithm over the petgraph indices. Nodes that become ready at
//! the same time are taken in input order, and the successors of a node are
//! visited in connection order, so a given graph always sorts the same way.

use crate::edge::Connection;
use crate::error::GraphError;
use crate::graph::WorkflowGraph;
use crate::node::Node;
use petgraph::Direction;
use petgraph::visit::EdgeRef;
use std::collections::VecDeque;

impl WorkflowGraph {
    /// Returns the nodes in execution order.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::CycleDetected`] if the graph is not a DAG. No
    /// partial order is returned in that case.
    pub fn topological_order(&self) -> Result<Vec<&Node>, GraphError> {
        let graph = self.inner();

        let mut in_degree: Vec<usize> = graph
            .node_indices()
            .map(|idx| graph.edges_directed(idx, Direction::Incoming).count())
            .collect();

        let mut ready: VecDeque<_> = graph
            .node_indices()
            .filter(|idx| in_degree[idx.index()] == 0)
            .collect();

        let mut order = Vec::with_capacity(graph.node_count());
        while let Some(index) = ready.pop_front() {
            order.push(index);

            let mut outgoing: Vec<_> = graph
                .edges_directed(index, Direction::Outgoing)
                .map(|edge| (edge.id(), edge.target()))
                .collect();
            outgoing.sort_by_key(|(edge_id, _)| *edge_id);

            for (_, target) in outgoing {
                let degree = &mut in_degree[target.index()];
                *degree -= 1;
                if *degree == 0 {
                    ready.push_back(target);
                }
            }
        }

        if order.len() < graph.node_count() {
            let unsorted = graph
                .node_indices()
                .filter(|idx| in_degree[idx.index()] > 0)
                .map(|idx| graph[idx].id.clone())
                .collect();
            return Err(GraphError::CycleDetected { unsorted });
        }

        Ok(order.into_iter().map(|idx| &graph[idx]).collect())
    }
}

/// Sorts nodes so every node comes after all of its direct predecessors.
///
/// An empty node set yields an empty order.
///
/// # Errors
///
/// Returns an error if the node set is structurally invalid or cyclic.
pub fn sort(nodes: &[Node], connections: &[Connection]) -> Result<Vec<Node>, GraphError> {
    let graph = WorkflowGraph::from_parts(nodes.iter().cloned(), connections.iter().cloned())?;
    let order = graph.topological_order()?;
    Ok(order.into_iter().cloned().collect())
}
