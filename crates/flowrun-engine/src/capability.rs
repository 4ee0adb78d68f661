use std::collections::HashMap;

use futures::future::BoxFuture;
use serde_json::{Map, Value};

use flowrun_core::error::{FlowError, Result};
use flowrun_core::types::LogLevel;

use crate::run::RunHandle;
use crate::variables;

/// The executable behaviour bound to a node type tag.
///
/// `execute` is raced against the node's timeout; when the timer wins the
/// returned future is dropped, so implementations must not spawn detached
/// work that keeps writing to the run afterwards.
pub trait Capability: Send + Sync + 'static {
    /// Run once against the node's configuration.
    fn execute(&self, ctx: NodeContext, config: Map<String, Value>) -> BoxFuture<'_, Result<Value>>;
}

/// What a capability can see of the run it executes in.
#[derive(Debug, Clone)]
pub struct NodeContext {
    pub node_id: String,
    pub label: String,
    pub attempt: u32,
    run: RunHandle,
}

impl NodeContext {
    pub fn new(node_id: impl Into<String>, label: impl Into<String>, run: RunHandle) -> Self {
        Self {
            node_id: node_id.into(),
            label: label.into(),
            attempt: 0,
            run,
        }
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    /// Snapshot of all node results accumulated so far.
    pub async fn data(&self) -> HashMap<String, Value> {
        self.run.data().await
    }

    /// Resolve `${...}` references in `template` against current run data.
    pub async fn resolve(&self, template: &str) -> String {
        variables::resolve(template, &self.run.data().await)
    }

    /// Append to the run log under this node's id.
    pub async fn log(&self, level: LogLevel, message: impl Into<String>, data: Option<Value>) {
        self.run.log(&self.node_id, level, message, data).await;
    }

    /// Build an `InvalidConfig` error for this node.
    pub fn invalid_config(&self, message: impl Into<String>) -> FlowError {
        FlowError::InvalidConfig {
            node: self.node_id.clone(),
            message: message.into(),
        }
    }
}
