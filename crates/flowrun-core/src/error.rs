use thiserror::Error;

use crate::types::Run;

#[derive(Debug, Error)]
pub enum FlowError {
    // Validation errors
    #[error("Graph contains a cycle through nodes: {}", nodes.join(", "))]
    GraphCycle { nodes: Vec<String> },

    #[error("Edge '{edge}' references unknown node '{node}'")]
    InvalidEdge { edge: String, node: String },

    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("Unknown node type '{tag}' on node '{node}'")]
    UnknownNodeType { node: String, tag: String },

    // Node errors
    #[error("Node '{node}' timed out after {timeout_ms}ms")]
    NodeTimeout { node: String, timeout_ms: u64 },

    #[error("Node '{node}' failed: {message}")]
    NodeExecution { node: String, message: String },

    #[error("Invalid config on node '{node}': {message}")]
    InvalidConfig { node: String, message: String },

    // Scheduler errors
    #[error("Scheduler deadlock, nodes never became ready: {}", pending.join(", "))]
    Deadlock { pending: Vec<String> },

    #[error("Run {} aborted: {source}", run.id)]
    Aborted {
        run: Box<Run>,
        source: Box<FlowError>,
    },

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FlowError {
    /// The node this error originated from, if any.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            FlowError::UnknownNodeType { node, .. }
            | FlowError::NodeTimeout { node, .. }
            | FlowError::NodeExecution { node, .. }
            | FlowError::InvalidConfig { node, .. } => Some(node),
            FlowError::Aborted { source, .. } => source.node_id(),
            _ => None,
        }
    }

    /// Unwrap an abort into its underlying cause, dropping the partial run.
    pub fn into_cause(self) -> FlowError {
        match self {
            FlowError::Aborted { source, .. } => *source,
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
