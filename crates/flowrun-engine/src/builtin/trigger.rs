use chrono::Utc;
use futures::future::BoxFuture;
use serde_json::{Map, Value};

use flowrun_core::error::Result;

use crate::capability::{Capability, NodeContext};

/// Entry point of a graph: passes the run data through unchanged.
pub struct TriggerCapability;

impl Capability for TriggerCapability {
    fn execute(&self, ctx: NodeContext, _config: Map<String, Value>) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            let data: Map<String, Value> = ctx.data().await.into_iter().collect();
            Ok(serde_json::json!({
                "triggered": true,
                "timestamp": Utc::now().to_rfc3339(),
                "data": data,
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::RunState;
    use serde_json::json;

    #[tokio::test]
    async fn test_trigger_copies_run_data() {
        let run = RunState::new("g", json!({"payload": {"id": 7}}));
        let ctx = NodeContext::new("start", "Start", run);
        let out = TriggerCapability.execute(ctx, Map::new()).await.unwrap();
        assert_eq!(out["triggered"], json!(true));
        assert_eq!(out["data"]["payload"]["id"], json!(7));
    }
}
