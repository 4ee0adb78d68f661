//! Dependency structure of a workflow graph.
//!
//! `DependencyGraph` is computed once per run from the immutable `Graph`:
//! in-degree per node and an adjacency list of direct successors. Both the
//! cycle validator and the level scheduler work from it; neither touches the
//! original edges again.

pub mod validate;

use std::collections::{HashMap, HashSet, VecDeque};

use flowrun_core::error::{FlowError, Result};
use flowrun_core::graph::Graph;

pub use validate::validate_acyclic;

/// In-degree counts and adjacency for one graph.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Node ids in graph declaration order.
    order: Vec<String>,
    in_degree: HashMap<String, usize>,
    adjacency: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Build from a graph, rejecting duplicate ids and dangling edges.
    pub fn build(graph: &Graph) -> Result<Self> {
        let mut order = Vec::with_capacity(graph.nodes.len());
        let mut in_degree = HashMap::with_capacity(graph.nodes.len());
        let mut adjacency: HashMap<String, Vec<String>> = HashMap::with_capacity(graph.nodes.len());

        for node in &graph.nodes {
            if in_degree.insert(node.id.clone(), 0usize).is_some() {
                return Err(FlowError::DuplicateNode(node.id.clone()));
            }
            adjacency.insert(node.id.clone(), Vec::new());
            order.push(node.id.clone());
        }

        for edge in &graph.edges {
            for endpoint in [&edge.source, &edge.target] {
                if !in_degree.contains_key(endpoint) {
                    return Err(FlowError::InvalidEdge {
                        edge: edge.id.clone(),
                        node: endpoint.clone(),
                    });
                }
            }
            if let Some(succ) = adjacency.get_mut(&edge.source) {
                succ.push(edge.target.clone());
            }
            if let Some(deg) = in_degree.get_mut(&edge.target) {
                *deg += 1;
            }
        }

        Ok(Self {
            order,
            in_degree,
            adjacency,
        })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Node ids in declaration order.
    pub fn node_ids(&self) -> &[String] {
        &self.order
    }

    pub fn in_degree(&self, id: &str) -> usize {
        self.in_degree.get(id).copied().unwrap_or(0)
    }

    /// A fresh copy of the in-degree map for the scheduler to consume.
    pub fn in_degrees(&self) -> HashMap<String, usize> {
        self.in_degree.clone()
    }

    /// Direct successors, in edge order.
    pub fn successors(&self, id: &str) -> &[String] {
        self.adjacency.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Everything transitively reachable from `id`, excluding `id` itself
    /// unless a path leads back to it.
    pub fn reachable_from(&self, id: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut queue: VecDeque<&str> = self.successors(id).iter().map(String::as_str).collect();

        while let Some(next) = queue.pop_front() {
            if !seen.insert(next) {
                continue;
            }
            out.push(next.to_string());
            queue.extend(self.successors(next).iter().map(String::as_str));
        }
        out
    }

    /// Static level partition: level 0 holds roots, level `n + 1` the nodes
    /// whose last dependency sits in level `n`. Ignores branch pruning.
    pub fn plan_levels(&self) -> Result<Vec<Vec<String>>> {
        validate_acyclic(self)?;

        let mut remaining = self.in_degrees();
        let mut levels = Vec::new();
        let mut ready: Vec<String> = self
            .order
            .iter()
            .filter(|id| self.in_degree(id) == 0)
            .cloned()
            .collect();

        while !ready.is_empty() {
            let mut next = Vec::new();
            for id in &ready {
                for succ in self.successors(id) {
                    if let Some(deg) = remaining.get_mut(succ) {
                        *deg = deg.saturating_sub(1);
                        if *deg == 0 {
                            next.push(succ.clone());
                        }
                    }
                }
            }
            levels.push(std::mem::replace(&mut ready, next));
        }
        Ok(levels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowrun_core::graph::{Edge, Node};

    fn diamond() -> Graph {
        Graph::new("diamond")
            .with_node(Node::trigger("a"))
            .with_node(Node::log("b", "b"))
            .with_node(Node::log("c", "c"))
            .with_node(Node::log("d", "d"))
            .with_edge("a", "b")
            .with_edge("a", "c")
            .with_edge("b", "d")
            .with_edge("c", "d")
    }

    #[test]
    fn test_in_degree_and_adjacency() {
        let deps = DependencyGraph::build(&diamond()).unwrap();
        assert_eq!(deps.len(), 4);
        assert_eq!(deps.in_degree("a"), 0);
        assert_eq!(deps.in_degree("d"), 2);
        assert_eq!(deps.successors("a"), &["b".to_string(), "c".to_string()]);
        assert!(deps.successors("d").is_empty());
    }

    #[test]
    fn test_dangling_edge_rejected() {
        let mut graph = diamond();
        graph.edges.push(Edge::new("d", "ghost"));
        let err = DependencyGraph::build(&graph).unwrap_err();
        match err {
            FlowError::InvalidEdge { edge, node } => {
                assert_eq!(edge, "d->ghost");
                assert_eq!(node, "ghost");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let graph = diamond().with_node(Node::trigger("a"));
        assert!(matches!(
            DependencyGraph::build(&graph),
            Err(FlowError::DuplicateNode(id)) if id == "a"
        ));
    }

    #[test]
    fn test_reachable_closure() {
        let deps = DependencyGraph::build(&diamond()).unwrap();
        let mut from_b = deps.reachable_from("b");
        from_b.sort();
        assert_eq!(from_b, vec!["d"]);

        let mut from_a = deps.reachable_from("a");
        from_a.sort();
        assert_eq!(from_a, vec!["b", "c", "d"]);
    }

    #[test]
    fn test_plan_levels() {
        let deps = DependencyGraph::build(&diamond()).unwrap();
        let levels = deps.plan_levels().unwrap();
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[0], vec!["a"]);
        assert_eq!(levels[1], vec!["b", "c"]);
        assert_eq!(levels[2], vec!["d"]);
    }
}
