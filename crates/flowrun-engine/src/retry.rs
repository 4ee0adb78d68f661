//! Retry/timeout wrapper around a single capability invocation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use flowrun_core::config::EngineConfig;
use flowrun_core::error::{FlowError, Result};
use flowrun_core::graph::Node;
use flowrun_core::types::{LogLevel, NodeMetrics, NodeStatus};

use crate::capability::{Capability, NodeContext};
use crate::run::RunHandle;
use crate::run_log::safe_serialize;

/// Effective execution policy for one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePolicy {
    pub max_retries: u32,
    pub backoff_ms: u64,
    /// Per-attempt timeout; 0 disables the timer.
    pub timeout_ms: u64,
    pub continue_on_error: bool,
}

impl NodePolicy {
    /// Run-wide options, overridden by the node's own `timeoutMs`,
    /// `continueOnError`, and `retry: {maxRetries, backoffMs}` config keys.
    pub fn for_node(node: &Node, options: &EngineConfig) -> Self {
        let retry = node.config.get("retry");
        let retry_field = |key: &str| retry.and_then(|r| r.get(key)).and_then(Value::as_u64);

        Self {
            max_retries: retry_field("maxRetries")
                .map(|n| n.min(u32::MAX as u64) as u32)
                .unwrap_or(options.retry.max_retries),
            backoff_ms: retry_field("backoffMs").unwrap_or(options.retry.backoff_ms),
            timeout_ms: node
                .config
                .get("timeoutMs")
                .and_then(Value::as_u64)
                .unwrap_or(options.timeout_ms),
            continue_on_error: node
                .config
                .get("continueOnError")
                .and_then(Value::as_bool)
                .unwrap_or(options.continue_on_error),
        }
    }

    /// Delay after failed attempt `attempt` (0-based): linear in the attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(attempt as u64 + 1))
    }
}

/// The result stored for a node whose failure was tolerated.
pub fn sentinel(error: &FlowError) -> Value {
    serde_json::json!({ "error": error.to_string(), "skipped": true })
}

/// Run `capability` for `node` under `policy`.
///
/// Stores the node's result in the run data and always records a metrics
/// entry. With `continue_on_error` an exhausted failure is replaced by the
/// sentinel result and returned as `Ok`; otherwise the error propagates.
pub async fn run_with_policy(
    node: &Node,
    capability: Arc<dyn Capability>,
    run: &RunHandle,
    policy: &NodePolicy,
) -> Result<Value> {
    let start_time = Utc::now();
    let started = Instant::now();
    let mut attempt = 0u32;

    let outcome = loop {
        let ctx = NodeContext::new(&node.id, &node.label, run.clone()).with_attempt(attempt);
        let call = capability.execute(ctx, node.config.clone());

        let result = if policy.timeout_ms == 0 {
            call.await
        } else {
            match tokio::time::timeout(Duration::from_millis(policy.timeout_ms), call).await {
                Ok(result) => result,
                Err(_) => Err(FlowError::NodeTimeout {
                    node: node.id.clone(),
                    timeout_ms: policy.timeout_ms,
                }),
            }
        };

        match result {
            Ok(value) => break Ok(value),
            Err(e) => {
                let e = wrap_failure(&node.id, e);
                if attempt >= policy.max_retries {
                    break Err(e);
                }
                let backoff = policy.backoff(attempt);
                warn!(
                    node_id = %node.id,
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Retrying node"
                );
                run.log(
                    &node.id,
                    LogLevel::Warn,
                    format!("Attempt {} failed: {}; retrying in {}ms", attempt + 1, e, backoff.as_millis()),
                    None,
                )
                .await;
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
        }
    };

    let elapsed_ms = started.elapsed().as_millis() as u64;
    let metrics = |status| NodeMetrics {
        start_time,
        end_time: Utc::now(),
        duration_ms: elapsed_ms,
        retries: attempt,
        status,
    };

    match outcome {
        Ok(value) => {
            debug!(node_id = %node.id, retries = attempt, elapsed_ms, "Node succeeded");
            run.record_metrics(&node.id, metrics(NodeStatus::Success)).await;
            run.log(&node.id, LogLevel::Info, "Node completed", Some(safe_serialize(&value)))
                .await;
            run.set_result(&node.id, value.clone()).await;
            Ok(value)
        }
        Err(e) => {
            run.record_metrics(&node.id, metrics(NodeStatus::Failed)).await;
            run.log(&node.id, LogLevel::Error, format!("Node failed: {}", e), None)
                .await;
            if policy.continue_on_error {
                let value = sentinel(&e);
                run.set_result(&node.id, value.clone()).await;
                Ok(value)
            } else {
                Err(e)
            }
        }
    }
}

/// Attribute a capability failure to its node.
fn wrap_failure(node_id: &str, e: FlowError) -> FlowError {
    match e {
        FlowError::NodeTimeout { .. } | FlowError::NodeExecution { .. } | FlowError::InvalidConfig { .. } => e,
        other => FlowError::NodeExecution {
            node: node_id.to_string(),
            message: other.to_string(),
        },
    }
}
