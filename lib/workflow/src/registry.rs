//! The executor registry.
//!
//! A read-only table from [`NodeType`] to its [`NodeExecutor`], built once at
//! startup and shared by every run. There is no way to add entries after
//! [`ExecutorRegistryBuilder::build`].

use crate::executor::NodeExecutor;
use crate::node::NodeType;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Error returned when a node type has no executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No executor is registered for the type.
    UnknownNodeType { node_type: NodeType },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownNodeType { node_type } => {
                write!(f, "executor not found for type {node_type}")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Map from node type to executor.
#[derive(Clone)]
pub struct ExecutorRegistry {
    executors: HashMap<NodeType, Arc<dyn NodeExecutor>>,
}

impl ExecutorRegistry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> ExecutorRegistryBuilder {
        ExecutorRegistryBuilder {
            executors: HashMap::new(),
        }
    }

    /// Returns the executor for `node_type`.
    ///
    /// # Errors
    ///
    /// Returns an error if no executor is registered for the type.
    pub fn resolve(&self, node_type: NodeType) -> Result<Arc<dyn NodeExecutor>, RegistryError> {
        self.executors
            .get(&node_type)
            .cloned()
            .ok_or(RegistryError::UnknownNodeType { node_type })
    }

    /// Returns true if `node_type` has an executor.
    #[must_use]
    pub fn contains(&self, node_type: NodeType) -> bool {
        self.executors.contains_key(&node_type)
    }

    /// Returns the node types without an executor, in declaration order.
    #[must_use]
    pub fn missing_types(&self) -> Vec<NodeType> {
        NodeType::ALL
            .into_iter()
            .filter(|t| !self.executors.contains_key(t))
            .collect()
    }

    /// Returns the number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.executors.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

impl fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&str> = self.executors.keys().map(NodeType::as_str).collect();
        types.sort_unstable();
        f.debug_struct("ExecutorRegistry")
            .field("types", &types)
            .finish()
    }
}

/// Builder for [`ExecutorRegistry`].
pub struct ExecutorRegistryBuilder {
    executors: HashMap<NodeType, Arc<dyn NodeExecutor>>,
}

impl ExecutorRegistryBuilder {
    /// Registers `executor` for `node_type`, replacing any earlier entry.
    #[must_use]
    pub fn register(self, node_type: NodeType, executor: impl NodeExecutor + 'static) -> Self {
        self.register_shared(node_type, Arc::new(executor))
    }

    /// Registers a shared executor, for types that use the same
    /// implementation.
    #[must_use]
    pub fn register_shared(mut self, node_type: NodeType, executor: Arc<dyn NodeExecutor>) -> Self {
        self.executors.insert(node_type, executor);
        self
    }

    /// Freezes the table.
    #[must_use]
    pub fn build(self) -> ExecutorRegistry {
        ExecutorRegistry {
            executors: self.executors,
        }
    }
}
