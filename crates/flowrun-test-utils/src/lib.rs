//! Mock capabilities and graph fixtures shared by flowrun tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::{json, Map, Value};

use flowrun_core::error::{FlowError, Result};
use flowrun_core::graph::{Graph, Node};
use flowrun_engine::{Capability, CapabilityRegistry, NodeContext};

/// Fails the first `failures` invocations, then succeeds.
pub struct FlakyCapability {
    failures: u32,
    calls: Arc<AtomicU32>,
}

impl FlakyCapability {
    pub fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Shared call counter, readable after the capability moves into a registry.
    pub fn calls(&self) -> Arc<AtomicU32> {
        self.calls.clone()
    }
}

impl Capability for FlakyCapability {
    fn execute(&self, ctx: NodeContext, _config: Map<String, Value>) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(FlowError::NodeExecution {
                    node: ctx.node_id,
                    message: format!("transient failure on call {}", call),
                });
            }
            Ok(json!({ "calls": call }))
        })
    }
}

/// Sleeps for `delay` before returning. Never completes inside a shorter timeout.
pub struct SlowCapability {
    delay: Duration,
}

impl SlowCapability {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Capability for SlowCapability {
    fn execute(&self, _ctx: NodeContext, _config: Map<String, Value>) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            Ok(json!({ "slept_ms": self.delay.as_millis() as u64 }))
        })
    }
}

/// Always fails with the given message.
pub struct FailingCapability {
    message: String,
}

impl FailingCapability {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Capability for FailingCapability {
    fn execute(&self, ctx: NodeContext, _config: Map<String, Value>) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            Err(FlowError::NodeExecution {
                node: ctx.node_id,
                message: self.message.clone(),
            })
        })
    }
}

/// Records `start:<id>` / `end:<id>` into a shared journal.
///
/// An optional `delayMs` config key holds the node open between the two.
pub struct RecordingCapability {
    journal: Arc<Mutex<Vec<String>>>,
}

impl RecordingCapability {
    pub fn new() -> (Self, Arc<Mutex<Vec<String>>>) {
        let journal = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                journal: journal.clone(),
            },
            journal,
        )
    }

    fn push(&self, event: String) {
        if let Ok(mut journal) = self.journal.lock() {
            journal.push(event);
        }
    }
}

impl Capability for RecordingCapability {
    fn execute(&self, ctx: NodeContext, config: Map<String, Value>) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            self.push(format!("start:{}", ctx.node_id));
            if let Some(ms) = config.get("delayMs").and_then(Value::as_u64) {
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
            self.push(format!("end:{}", ctx.node_id));
            Ok(json!({ "node": ctx.node_id, "attempt": ctx.attempt }))
        })
    }
}

/// Built-ins plus a `record` capability wired to the returned journal.
pub fn recording_registry() -> (CapabilityRegistry, Arc<Mutex<Vec<String>>>) {
    let mut registry = CapabilityRegistry::with_builtins();
    let (recorder, journal) = RecordingCapability::new();
    registry.register("record", recorder);
    (registry, journal)
}

/// A `record` node with an optional hold time.
pub fn record_node(id: &str, delay_ms: u64) -> Node {
    Node::new(id, "record").with_config("delayMs", json!(delay_ms))
}

/// A -> B, A -> C, B -> D, C -> D, all `record` nodes.
pub fn diamond_graph() -> Graph {
    Graph::new("diamond")
        .with_node(record_node("A", 0))
        .with_node(record_node("B", 20))
        .with_node(record_node("C", 5))
        .with_node(record_node("D", 0))
        .with_edge("A", "B")
        .with_edge("A", "C")
        .with_edge("B", "D")
        .with_edge("C", "D")
}

/// Index of `event` in a journal; panics when absent.
pub fn journal_position(journal: &[String], event: &str) -> usize {
    journal
        .iter()
        .position(|e| e == event)
        .unwrap_or_else(|| panic!("journal has no '{}' event: {:?}", event, journal))
}
