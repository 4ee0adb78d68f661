use futures::future::BoxFuture;
use serde_json::{Map, Value};

use flowrun_core::error::Result;
use flowrun_core::types::LogLevel;

use crate::capability::{Capability, NodeContext};
use crate::variables;

// ── LogAction ───────────────────────────────────────────────────

/// `actionType = "log"`: resolve `message` and append it to the run log.
pub struct LogAction;

impl Capability for LogAction {
    fn execute(&self, ctx: NodeContext, config: Map<String, Value>) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            let template = config.get("message").and_then(Value::as_str).unwrap_or_default();
            let level = config
                .get("level")
                .and_then(Value::as_str)
                .map(LogLevel::parse_or_info)
                .unwrap_or(LogLevel::Info);

            let message = ctx.resolve(template).await;
            ctx.log(level, message.clone(), None).await;
            Ok(serde_json::json!({ "logged": true, "message": message }))
        })
    }
}

// ── TransformAction ─────────────────────────────────────────────

/// `actionType = "transform"`: echo the configured `data`, templates resolved.
pub struct TransformAction;

impl Capability for TransformAction {
    fn execute(&self, ctx: NodeContext, config: Map<String, Value>) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            let input = config.get("data").cloned().unwrap_or(Value::Null);
            let data = variables::resolve_value(&input, &ctx.data().await);
            Ok(serde_json::json!({ "transformed": true, "data": data }))
        })
    }
}
