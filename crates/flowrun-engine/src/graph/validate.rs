use tracing::debug;

use flowrun_core::error::{FlowError, Result};

use super::DependencyGraph;

/// Confirm the graph is acyclic via Kahn-style reduction.
///
/// Nodes left over after the reduction are on a cycle or downstream of
/// one; they are reported in declaration order.
pub fn validate_acyclic(deps: &DependencyGraph) -> Result<()> {
    let mut in_degree = deps.in_degrees();
    let mut queue: Vec<&str> = deps
        .node_ids()
        .iter()
        .filter(|id| deps.in_degree(id) == 0)
        .map(String::as_str)
        .collect();
    let mut removed = 0usize;

    while let Some(id) = queue.pop() {
        removed += 1;
        for succ in deps.successors(id) {
            if let Some(deg) = in_degree.get_mut(succ) {
                *deg -= 1;
                if *deg == 0 {
                    queue.push(succ.as_str());
                }
            }
        }
    }

    if removed == deps.len() {
        return Ok(());
    }

    let nodes: Vec<String> = deps
        .node_ids()
        .iter()
        .filter(|id| in_degree.get(*id).is_some_and(|deg| *deg > 0))
        .cloned()
        .collect();
    debug!(?nodes, "Cycle detected during validation");
    Err(FlowError::GraphCycle { nodes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowrun_core::graph::{Graph, Node};

    fn nodes(ids: &[&str]) -> Graph {
        ids.iter()
            .fold(Graph::new("g"), |g, id| g.with_node(Node::log(*id, *id)))
    }

    #[test]
    fn test_acyclic_passes() {
        let graph = nodes(&["a", "b", "c"]).with_edge("a", "b").with_edge("b", "c");
        let deps = DependencyGraph::build(&graph).unwrap();
        assert!(validate_acyclic(&deps).is_ok());
    }

    #[test]
    fn test_cycle_names_exactly_cyclic_nodes() {
        let graph = nodes(&["a", "x", "y", "z"])
            .with_edge("a", "x")
            .with_edge("x", "y")
            .with_edge("y", "z")
            .with_edge("z", "x");
        let deps = DependencyGraph::build(&graph).unwrap();
        match validate_acyclic(&deps) {
            Err(FlowError::GraphCycle { nodes }) => assert_eq!(nodes, vec!["x", "y", "z"]),
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_self_loop() {
        let graph = nodes(&["a"]).with_edge("a", "a");
        let deps = DependencyGraph::build(&graph).unwrap();
        assert!(matches!(
            validate_acyclic(&deps),
            Err(FlowError::GraphCycle { nodes }) if nodes == vec!["a"]
        ));
    }

    #[test]
    fn test_downstream_of_cycle_is_reported() {
        let graph = nodes(&["x", "y", "tail"])
            .with_edge("x", "y")
            .with_edge("y", "x")
            .with_edge("y", "tail");
        let deps = DependencyGraph::build(&graph).unwrap();
        match validate_acyclic(&deps) {
            Err(FlowError::GraphCycle { nodes }) => assert_eq!(nodes, vec!["x", "y", "tail"]),
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_graph_is_valid() {
        let deps = DependencyGraph::build(&Graph::new("empty")).unwrap();
        assert!(validate_acyclic(&deps).is_ok());
    }
}
