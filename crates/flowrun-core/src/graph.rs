//! Graph description consumed by the engine.
//!
//! The ingestion shape is the plain JSON document produced by the
//! persistence layer:
//!
//! ```json
//! { "nodes": [{"id": "a", "type": "trigger", "label": "Start", "config": {}}],
//!   "edges": [{"id": "e1", "source": "a", "target": "b", "sourceHandle": "true"}] }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Node type tag.
///
/// The built-in set is closed; anything else is an externally registered
/// capability looked up by its tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    Trigger,
    Action,
    Condition,
    External(String),
}

impl NodeKind {
    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::Trigger => "trigger",
            NodeKind::Action => "action",
            NodeKind::Condition => "condition",
            NodeKind::External(tag) => tag,
        }
    }

    pub fn is_condition(&self) -> bool {
        matches!(self, NodeKind::Condition)
    }
}

impl From<String> for NodeKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "trigger" => NodeKind::Trigger,
            "action" => NodeKind::Action,
            "condition" => NodeKind::Condition,
            _ => NodeKind::External(tag),
        }
    }
}

impl From<&str> for NodeKind {
    fn from(tag: &str) -> Self {
        NodeKind::from(tag.to_string())
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::External(tag) => tag,
            other => other.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single step in the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier within the graph.
    pub id: String,
    /// Type tag binding this node to a capability.
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Human-readable label.
    #[serde(default)]
    pub label: String,
    /// Free-form configuration consumed by the bound capability.
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl Node {
    /// Create a node with an empty configuration.
    pub fn new(id: impl Into<String>, kind: impl Into<NodeKind>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            kind: kind.into(),
            config: Map::new(),
        }
    }

    pub fn trigger(id: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Trigger)
    }

    pub fn condition(id: impl Into<String>, expression: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Condition).with_config("expression", Value::String(expression.into()))
    }

    pub fn log(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Action)
            .with_config("actionType", Value::String("log".into()))
            .with_config("message", Value::String(message.into()))
    }

    /// Set the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set a single configuration key.
    pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    /// Read a string config value.
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(|v| v.as_str())
    }
}

/// A directed dependency between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Output handle on the source (condition nodes use "true"/"false").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl Edge {
    /// Create an edge with an id derived from its endpoints.
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("{}->{}", source, target),
            source,
            target,
            source_handle: None,
            target_handle: None,
        }
    }

    /// Set the source handle.
    pub fn with_source_handle(mut self, handle: impl Into<String>) -> Self {
        self.source_handle = Some(handle.into());
        self
    }
}

/// Immutable description of one run's nodes and edges.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_edge(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.edges.push(Edge::new(source, target));
        self
    }

    /// Parse the JSON ingestion shape.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}
