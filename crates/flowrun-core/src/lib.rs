pub mod config;
pub mod error;
pub mod graph;
pub mod types;

pub use config::{AppConfig, EngineConfig, RetryConfig};
pub use error::{FlowError, Result};
pub use graph::{Edge, Graph, Node, NodeKind};
pub use types::*;
