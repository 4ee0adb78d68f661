use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;

use flowrun_core::types::{LogLevel, NodeMetrics, Run, RunId};

use crate::run_log::RunLog;

/// Mutable state of one in-flight run.
///
/// Nodes of the same level complete concurrently; every write to the data
/// map, log, and metrics goes through these mutexes.
#[derive(Debug)]
pub struct RunState {
    id: RunId,
    graph_id: String,
    started_at: chrono::DateTime<Utc>,
    data: Mutex<HashMap<String, Value>>,
    log: Mutex<RunLog>,
    metrics: Mutex<HashMap<String, NodeMetrics>>,
}

/// Shared handle to a run's state.
pub type RunHandle = Arc<RunState>;

impl RunState {
    /// Start a run, seeding the data map from the initial payload.
    ///
    /// An object payload contributes each top-level key; anything else is
    /// stored under `input`. `null` seeds nothing.
    pub fn new(graph_id: impl Into<String>, initial: Value) -> RunHandle {
        let data = match initial {
            Value::Object(map) => map.into_iter().collect(),
            Value::Null => HashMap::new(),
            other => HashMap::from([("input".to_string(), other)]),
        };
        Arc::new(Self {
            id: RunId::new(),
            graph_id: graph_id.into(),
            started_at: Utc::now(),
            data: Mutex::new(data),
            log: Mutex::new(RunLog::new()),
            metrics: Mutex::new(HashMap::new()),
        })
    }

    pub fn id(&self) -> &RunId {
        &self.id
    }

    /// Snapshot of the data map.
    pub async fn data(&self) -> HashMap<String, Value> {
        self.data.lock().await.clone()
    }

    pub async fn get(&self, node_id: &str) -> Option<Value> {
        self.data.lock().await.get(node_id).cloned()
    }

    pub async fn set_result(&self, node_id: &str, value: Value) {
        self.data.lock().await.insert(node_id.to_string(), value);
    }

    pub async fn log(&self, node_id: &str, level: LogLevel, message: impl Into<String>, data: Option<Value>) {
        self.log.lock().await.append(node_id, level, message, data);
    }

    pub async fn record_metrics(&self, node_id: &str, metrics: NodeMetrics) {
        self.metrics.lock().await.insert(node_id.to_string(), metrics);
    }

    /// Drain the state into a caller-owned `Run`.
    pub async fn finish(&self) -> Run {
        let data = std::mem::take(&mut *self.data.lock().await);
        let logs = std::mem::take(&mut *self.log.lock().await).into_entries();
        let metrics = std::mem::take(&mut *self.metrics.lock().await);
        Run {
            id: self.id.clone(),
            graph_id: self.graph_id.clone(),
            started_at: self.started_at,
            finished_at: Some(Utc::now()),
            data,
            logs,
            metrics,
        }
    }
}
