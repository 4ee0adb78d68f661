//! Execution engine for flowrun graphs.
//!
//! Build a [`CapabilityRegistry`] once at startup, wrap it in an [`Engine`],
//! and call [`Engine::execute`] per run.

pub mod builtin;
pub mod capability;
pub mod graph;
pub mod registry;
pub mod retry;
pub mod run;
pub mod run_log;
pub mod scheduler;
pub mod variables;

pub use capability::{Capability, NodeContext};
pub use graph::{validate_acyclic, DependencyGraph};
pub use registry::CapabilityRegistry;
pub use retry::NodePolicy;
pub use run::{RunHandle, RunState};
pub use run_log::{write_jsonl, RunLog};
pub use scheduler::{execute_graph, Engine, ExecutionPlan};
