use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique run identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Severity of a run log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse a level name, falling back to `Info` for anything unrecognised.
    pub fn parse_or_info(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// One entry in a run's append-only log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub node_id: String,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Final status of a node within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Success,
    Failed,
    Skipped,
}

/// Timing and retry record for one node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: u64,
    pub retries: u32,
    pub status: NodeStatus,
}

impl NodeMetrics {
    /// Metrics for a node that was pruned and never ran.
    pub fn skipped() -> Self {
        let now = Utc::now();
        Self {
            start_time: now,
            end_time: now,
            duration_ms: 0,
            retries: 0,
            status: NodeStatus::Skipped,
        }
    }
}

/// A completed (or aborted) execution of a graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub graph_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Node id -> that node's result.
    pub data: HashMap<String, serde_json::Value>,
    pub logs: Vec<LogEntry>,
    pub metrics: HashMap<String, NodeMetrics>,
}

impl Run {
    pub fn new(graph_id: impl Into<String>) -> Self {
        Self {
            id: RunId::new(),
            graph_id: graph_id.into(),
            started_at: Utc::now(),
            finished_at: None,
            data: HashMap::new(),
            logs: Vec::new(),
            metrics: HashMap::new(),
        }
    }

    /// Status recorded for a node, if it settled.
    pub fn status_of(&self, node_id: &str) -> Option<NodeStatus> {
        self.metrics.get(node_id).map(|m| m.status)
    }

    /// Count of nodes in each final status: (success, failed, skipped).
    pub fn status_counts(&self) -> (usize, usize, usize) {
        self.metrics
            .values()
            .fold((0, 0, 0), |(ok, failed, skipped), m| match m.status {
                NodeStatus::Success => (ok + 1, failed, skipped),
                NodeStatus::Failed => (ok, failed + 1, skipped),
                NodeStatus::Skipped => (ok, failed, skipped + 1),
            })
    }
}
