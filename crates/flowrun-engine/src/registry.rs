use std::collections::HashMap;
use std::sync::Arc;

use flowrun_core::error::{FlowError, Result};
use flowrun_core::graph::{Node, NodeKind};

use crate::builtin::{ConditionCapability, LogAction, TransformAction, TriggerCapability};
use crate::capability::Capability;

/// Registry of capabilities keyed by type tag.
///
/// Actions live one level down, at `action.<actionType>`. Populate the
/// registry before the first run; the engine only reads it afterwards.
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            capabilities: HashMap::new(),
        }
    }

    /// Register a capability under a node type tag.
    pub fn register(&mut self, tag: impl Into<String>, capability: impl Capability) {
        self.capabilities.insert(tag.into(), Arc::new(capability));
    }

    /// Register an action delegate reachable as `actionType = action_type`.
    pub fn register_action(&mut self, action_type: &str, capability: impl Capability) {
        self.register(action_tag(action_type), capability);
    }

    /// Unregister a capability by tag.
    pub fn unregister(&mut self, tag: &str) -> bool {
        self.capabilities.remove(tag).is_some()
    }

    pub fn get(&self, tag: &str) -> Option<Arc<dyn Capability>> {
        self.capabilities.get(tag).cloned()
    }

    /// List all registered tags.
    pub fn list(&self) -> Vec<&str> {
        self.capabilities.keys().map(|s| s.as_str()).collect()
    }

    /// The tag a node dispatches on.
    pub fn dispatch_tag(node: &Node) -> Result<String> {
        match &node.kind {
            NodeKind::Action => node
                .config_str("actionType")
                .map(action_tag)
                .ok_or_else(|| FlowError::InvalidConfig {
                    node: node.id.clone(),
                    message: "action node is missing 'actionType'".into(),
                }),
            other => Ok(other.as_str().to_string()),
        }
    }

    /// Find the capability bound to a node.
    pub fn resolve(&self, node: &Node) -> Result<Arc<dyn Capability>> {
        let tag = Self::dispatch_tag(node)?;
        self.get(&tag).ok_or_else(|| FlowError::UnknownNodeType {
            node: node.id.clone(),
            tag,
        })
    }

    /// Create a registry with all built-in capabilities registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(NodeKind::Trigger.as_str(), TriggerCapability);
        registry.register(NodeKind::Condition.as_str(), ConditionCapability);
        registry.register_action("log", LogAction);
        registry.register_action("transform", TransformAction);
        registry
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn action_tag(action_type: &str) -> String {
    format!("action.{}", action_type)
}
