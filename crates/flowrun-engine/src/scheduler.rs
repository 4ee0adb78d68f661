//! Level scheduler: runs a validated graph one dependency level at a time.
//!
//! Every node whose remaining in-degree is zero forms the current level.
//! The whole level is launched concurrently and awaited as a unit; only then
//! does the single coordinating task update in-degrees, prune branches behind
//! false conditions, and compute the next level. Bookkeeping never runs
//! concurrently with itself, so it needs no locking.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, error, info};

use flowrun_core::config::EngineConfig;
use flowrun_core::error::{FlowError, Result};
use flowrun_core::graph::{Graph, Node};
use flowrun_core::types::{LogLevel, NodeMetrics, Run};

use crate::capability::Capability;
use crate::graph::{validate_acyclic, DependencyGraph};
use crate::registry::CapabilityRegistry;
use crate::retry::{run_with_policy, NodePolicy};
use crate::run::{RunHandle, RunState};

/// The execution engine: a capability registry plus default run options.
#[derive(Clone)]
pub struct Engine {
    registry: Arc<CapabilityRegistry>,
    options: EngineConfig,
}

/// A graph that passed validation, with every node bound to its capability.
pub struct ExecutionPlan<'g> {
    graph: &'g Graph,
    deps: DependencyGraph,
    bindings: HashMap<&'g str, Arc<dyn Capability>>,
}

impl ExecutionPlan<'_> {
    pub fn dependencies(&self) -> &DependencyGraph {
        &self.deps
    }

    /// Static level partition of the graph.
    pub fn levels(&self) -> Result<Vec<Vec<String>>> {
        self.deps.plan_levels()
    }
}

impl Engine {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            registry,
            options: EngineConfig::default(),
        }
    }

    /// Set the default options used by `execute`.
    pub fn with_options(mut self, options: EngineConfig) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn options(&self) -> &EngineConfig {
        &self.options
    }

    /// Validate edges, reject cycles, and bind every node to a capability.
    ///
    /// Nothing executes; any failure here aborts before the first node.
    pub fn prepare<'g>(&self, graph: &'g Graph) -> Result<ExecutionPlan<'g>> {
        let deps = DependencyGraph::build(graph)?;
        validate_acyclic(&deps)?;

        let bindings = graph
            .nodes
            .iter()
            .map(|node| Ok((node.id.as_str(), self.registry.resolve(node)?)))
            .collect::<Result<HashMap<_, _>>>()?;

        Ok(ExecutionPlan {
            graph,
            deps,
            bindings,
        })
    }

    /// Execute a graph with the engine's default options.
    pub async fn execute(&self, graph: &Graph, initial: Value) -> Result<Run> {
        self.execute_with(graph, initial, &self.options).await
    }

    /// Execute a graph to completion.
    ///
    /// Returns the finished run. A fatal node failure returns
    /// `FlowError::Aborted` carrying the partial run.
    pub async fn execute_with(&self, graph: &Graph, initial: Value, options: &EngineConfig) -> Result<Run> {
        let plan = self.prepare(graph)?;
        let run = RunState::new(&graph.id, initial);
        info!(run_id = %run.id(), graph_id = %graph.id, nodes = graph.nodes.len(), "Run started");

        let started = Instant::now();
        match drive(&plan, &run, options).await {
            Ok(()) => {
                let run = run.finish().await;
                let (ok, failed, skipped) = run.status_counts();
                info!(
                    run_id = %run.id,
                    succeeded = ok,
                    failed,
                    skipped,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Run complete"
                );
                Ok(run)
            }
            Err(e @ FlowError::Deadlock { .. }) => {
                error!(run_id = %run.id(), error = %e, "Scheduler bookkeeping defect");
                Err(e)
            }
            Err(e) => {
                error!(run_id = %run.id(), error = %e, "Run aborted");
                Err(FlowError::Aborted {
                    run: Box::new(run.finish().await),
                    source: Box::new(e),
                })
            }
        }
    }
}

/// Run an entire graph against `registry`.
pub async fn execute_graph(
    registry: Arc<CapabilityRegistry>,
    graph: &Graph,
    initial: Value,
    options: &EngineConfig,
) -> Result<Run> {
    Engine::new(registry).execute_with(graph, initial, options).await
}

/// Whether a condition result lets downstream nodes run.
fn continues(result: &Value) -> bool {
    result.get("continue").and_then(Value::as_bool) == Some(true)
}

async fn drive(plan: &ExecutionPlan<'_>, run: &RunHandle, options: &EngineConfig) -> Result<()> {
    let deps = &plan.deps;
    let nodes: HashMap<&str, &Node> = plan.graph.nodes.iter().map(|n| (n.id.as_str(), n)).collect();

    let mut in_degree = deps.in_degrees();
    let mut executed: HashSet<String> = HashSet::new();
    let mut skipped: HashSet<String> = HashSet::new();
    let mut ready: Vec<String> = deps
        .node_ids()
        .iter()
        .filter(|id| deps.in_degree(id) == 0)
        .cloned()
        .collect();
    let mut level = 0usize;

    while !ready.is_empty() {
        ready.retain(|id| !executed.contains(id) && !skipped.contains(id));
        info!(depth = level, nodes = ready.len(), "Executing level");

        let launches = ready.iter().enumerate().filter_map(|(idx, id)| {
            let node = *nodes.get(id.as_str())?;
            let capability = plan.bindings.get(id.as_str())?.clone();
            let policy = NodePolicy::for_node(node, options);
            Some(async move {
                let result = run_with_policy(node, capability, run, &policy).await;
                (idx, node, result)
            })
        });

        let mut results: Vec<(usize, &Node, Result<Value>)> = match options.max_concurrency {
            Some(limit) => stream::iter(launches).buffer_unordered(limit.max(1)).collect().await,
            None => futures::future::join_all(launches).await,
        };
        results.sort_by_key(|(idx, _, _)| *idx);

        let mut settled = Vec::with_capacity(results.len());
        let mut pruning = Vec::new();
        let mut failure = None;

        for (_, node, result) in results {
            executed.insert(node.id.clone());
            settled.push(node.id.clone());
            match result {
                Ok(value) => {
                    if node.kind.is_condition() && !continues(&value) {
                        pruning.push(node.id.clone());
                    }
                }
                Err(e) => {
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }

        // Prune the full downstream closure of every false condition, even
        // nodes that another live path also reaches.
        for condition in &pruning {
            for id in deps.reachable_from(condition) {
                if executed.contains(&id) || !skipped.insert(id.clone()) {
                    continue;
                }
                run.record_metrics(&id, NodeMetrics::skipped()).await;
                run.log(
                    &id,
                    LogLevel::Info,
                    format!("Skipped: branch pruned by condition '{}'", condition),
                    None,
                )
                .await;
                settled.push(id);
            }
        }

        let mut next = Vec::new();
        for id in &settled {
            for succ in deps.successors(id) {
                if let Some(deg) = in_degree.get_mut(succ) {
                    *deg = deg.saturating_sub(1);
                    if *deg == 0 && !executed.contains(succ) && !skipped.contains(succ) {
                        next.push(succ.clone());
                    }
                }
            }
        }

        debug!(depth = level, settled = settled.len(), next = next.len(), "Level settled");
        ready = next;
        level += 1;
    }

    if executed.len() + skipped.len() < deps.len() {
        let pending = deps
            .node_ids()
            .iter()
            .filter(|id| !executed.contains(*id) && !skipped.contains(*id))
            .cloned()
            .collect();
        return Err(FlowError::Deadlock { pending });
    }
    Ok(())
}
