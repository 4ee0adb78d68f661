use futures::future::BoxFuture;
use serde_json::{Map, Value};

use flowrun_core::error::Result;

use crate::capability::{Capability, NodeContext};
use crate::variables;

/// Evaluates `expression` (or the truthiness of `data`) to decide whether
/// downstream nodes run.
///
/// Returns `{ "result": b, "continue": b }`; the scheduler prunes everything
/// downstream when `continue` is not `true`.
pub struct ConditionCapability;

impl Capability for ConditionCapability {
    fn execute(&self, ctx: NodeContext, config: Map<String, Value>) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            let data = ctx.data().await;
            let result = match (config.get("expression"), config.get("data")) {
                (Some(Value::String(expr)), _) => truthy_str(&variables::resolve(expr, &data)),
                (Some(Value::Bool(b)), _) => *b,
                (Some(other), _) => truthy(other),
                (None, Some(value)) => truthy(&variables::resolve_value(value, &data)),
                (None, None) => false,
            };
            Ok(serde_json::json!({ "result": result, "continue": result }))
        })
    }
}

/// Truthiness of a resolved value: null, false, 0, and falsy strings are false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => truthy_str(s),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn truthy_str(s: &str) -> bool {
    !matches!(s.trim(), "" | "false" | "0" | "null" | "undefined")
}
