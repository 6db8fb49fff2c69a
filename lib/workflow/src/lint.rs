//! Checks template references against the keys upstream nodes produce.
//!
//! Each node type declares its output key (see [`NodeType::output_key`]).
//! Walking the execution order, a template root is resolvable if it is one
//! of the initial-data keys or the output key of an earlier node.
//!
//! [`NodeType::output_key`]: crate::node::NodeType::output_key

use crate::context::ExecutionContext;
use crate::node::{Node, NodeId};
use crate::template::references;
use serde_json::Value as JsonValue;
use std::collections::HashSet;

/// A template expression whose root key no earlier node writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReference {
    /// The node whose configuration holds the expression.
    pub node_id: NodeId,
    /// The expression text.
    pub expression: String,
    /// The context key that will be missing.
    pub root: String,
}

/// Returns every reference in `order` that cannot resolve.
#[must_use]
pub fn unresolved_references(order: &[&Node], initial: &ExecutionContext) -> Vec<UnresolvedReference> {
    let mut known: HashSet<String> = initial.keys().map(str::to_string).collect();
    let mut unresolved = Vec::new();

    for node in order {
        let mut strings = Vec::new();
        for value in node.data.values() {
            collect_strings(value, &mut strings);
        }

        for source in strings {
            for reference in references(source) {
                let root = reference.root();
                if !known.contains(root) {
                    unresolved.push(UnresolvedReference {
                        node_id: node.id.clone(),
                        root: root.to_string(),
                        expression: reference.expression.clone(),
                    });
                }
            }
        }

        if let Some(key) = node.output_key() {
            known.insert(key.to_string());
        }
    }

    unresolved
}

fn collect_strings<'a>(value: &'a JsonValue, out: &mut Vec<&'a str>) {
    match value {
        JsonValue::String(s) => out.push(s),
        JsonValue::Array(items) => items.iter().for_each(|v| collect_strings(v, out)),
        JsonValue::Object(map) => map.values().for_each(|v| collect_strings(v, out)),
        JsonValue::Null | JsonValue::Bool(_) | JsonValue::Number(_) => {}
    }
}
