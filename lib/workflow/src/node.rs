//! Workflow node types.
//!
//! A node has:
//! - An id, unique within its workflow
//! - A type tag from the closed set of [`NodeType`]s
//! - Opaque, type-specific configuration data that may contain templates

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::str::FromStr;

/// Configuration data attached to a node.
pub type NodeData = Map<String, JsonValue>;

/// Identifier of a node within a workflow.
///
/// Node ids are assigned by the editor and are only unique per workflow,
/// so they are plain strings rather than ULIDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Creates a node id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Error returned when a type tag is not one of the known node types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownNodeType {
    /// The unrecognised tag.
    pub tag: String,
}

impl fmt::Display for UnknownNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown node type: {}", self.tag)
    }
}

impl std::error::Error for UnknownNodeType {}

/// Where a node type writes its output in the execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKey {
    /// The node passes the context through unchanged.
    None,
    /// The node always writes this key.
    Fixed(&'static str),
    /// The key is read from the named field of the node's data.
    FromData(&'static str),
}

/// The closed set of node types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    /// Placeholder start node created with every new workflow.
    Initial,
    /// Started by a user from the editor.
    ManualTrigger,
    /// Started by a Google Form submission webhook.
    GoogleFormTrigger,
    /// Started by a Telegram bot webhook.
    TelegramTrigger,
    /// Outbound HTTP request.
    HttpRequest,
    /// Chat completion through OpenRouter.
    OpenrouterNode,
    /// Tool-using agent.
    OpenAgentNode,
    /// File upload.
    FileUpload,
    /// Walrus blob storage.
    WalrusNodeStorage,
}

impl NodeType {
    /// Every node type, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Initial,
        Self::ManualTrigger,
        Self::GoogleFormTrigger,
        Self::TelegramTrigger,
        Self::HttpRequest,
        Self::OpenrouterNode,
        Self::OpenAgentNode,
        Self::FileUpload,
        Self::WalrusNodeStorage,
    ];

    /// Returns the persisted type tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "INITIAL",
            Self::ManualTrigger => "MANUAL_TRIGGER",
            Self::GoogleFormTrigger => "GOOGLE_FORM_TRIGGER",
            Self::TelegramTrigger => "TELEGRAM_TRIGGER",
            Self::HttpRequest => "HTTP_REQUEST",
            Self::OpenrouterNode => "OPENROUTER_NODE",
            Self::OpenAgentNode => "OPEN_AGENT_NODE",
            Self::FileUpload => "FILE_UPLOAD",
            Self::WalrusNodeStorage => "WALRUS_NODE_STORAGE",
        }
    }

    /// Returns the status topic that UI subscribers listen on for this type.
    #[must_use]
    pub const fn channel(&self) -> &'static str {
        match self {
            Self::Initial | Self::ManualTrigger => "manual-trigger-execution",
            Self::GoogleFormTrigger => "google-form-trigger-execution",
            Self::TelegramTrigger => "telegram-trigger-execution",
            Self::HttpRequest => "http-request-execution",
            Self::OpenrouterNode => "openrouter-node-execution",
            Self::OpenAgentNode => "open-agent-execution",
            Self::FileUpload => "file-upload-execution",
            Self::WalrusNodeStorage => "walrus-node-execution",
        }
    }

    /// Returns true for the placeholder node an editor drops into an empty
    /// workflow. It is never the start of a run.
    #[must_use]
    pub const fn is_initial_marker(&self) -> bool {
        matches!(self, Self::Initial)
    }

    /// Returns where this type writes its output.
    #[must_use]
    pub const fn output_key(&self) -> OutputKey {
        match self {
            Self::HttpRequest | Self::OpenrouterNode => OutputKey::FromData("variableName"),
            Self::TelegramTrigger => OutputKey::Fixed("telegramNode"),
            Self::Initial
            | Self::ManualTrigger
            | Self::GoogleFormTrigger
            | Self::OpenAgentNode
            | Self::FileUpload
            | Self::WalrusNodeStorage => OutputKey::None,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = UnknownNodeType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownNodeType { tag: s.to_string() })
    }
}

/// A node in a workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique id within the workflow.
    pub id: NodeId,
    /// The type tag selecting the executor.
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Type-specific configuration.
    #[serde(default)]
    pub data: NodeData,
}

impl Node {
    /// Creates a node with empty configuration.
    #[must_use]
    pub fn new(id: impl Into<NodeId>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            node_type,
            data: NodeData::new(),
        }
    }

    /// Adds a configuration field.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Returns a configuration field as a non-empty string.
    #[must_use]
    pub fn data_str(&self, key: &str) -> Option<&str> {
        data_str(&self.data, key)
    }

    /// Returns the context key this node writes, if any.
    #[must_use]
    pub fn output_key(&self) -> Option<&str> {
        match self.node_type.output_key() {
            OutputKey::None => None,
            OutputKey::Fixed(key) => Some(key),
            OutputKey::FromData(field) => self.data_str(field),
        }
    }
}

/// Reads a non-empty string field from node data.
#[must_use]
pub fn data_str<'a>(data: &'a NodeData, key: &str) -> Option<&'a str> {
    data.get(key)
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
