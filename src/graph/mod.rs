// src/graph/mod.rs

//! Unweighted, undirected graphs keyed by string node ids.
//!
//! [`Graph::from_parts`] accepts whatever the caller has; the distance
//! functions in [`metrics`] assume a simple graph but do not check it. The
//! editing methods ([`Graph::add_node`], [`Graph::add_edge`]) do check, and are
//! what an interactive editor should go through.

pub mod metrics;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

pub use metrics::{
    bfs_distances, connected_components, distance_matrix, graph_metrics, metrics_from_distances,
    shortest_path, GraphMetrics,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error("node already exists: {0}")]
    DuplicateNode(String),

    #[error("edge already exists: {0} - {1}")]
    DuplicateEdge(String, String),

    #[error("self-loop on node {0}")]
    SelfLoop(String),
}

/// Hop count from a BFS source. [`Distance::INFINITY`] marks unreachable nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Distance(pub u32);

impl Distance {
    pub const INFINITY: Distance = Distance(u32::MAX);
    pub const ZERO: Distance = Distance(0);

    pub const fn is_finite(&self) -> bool {
        self.0 != u32::MAX
    }

    pub const fn hops(&self) -> Option<u32> {
        if self.is_finite() {
            Some(self.0)
        } else {
            None
        }
    }

    pub const fn increment(&self) -> Distance {
        Distance(self.0 + 1)
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.hops() {
            Some(d) => write!(f, "{}", d),
            None => write!(f, "∞"),
        }
    }
}

// Unreachable serializes as null.
impl Serialize for Distance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.hops().serialize(serializer)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    nodes: Vec<String>,
    edges: Vec<(String, String)>,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    /// Wraps caller-supplied nodes and edges without validation.
    pub fn from_parts(nodes: Vec<String>, edges: Vec<(String, String)>) -> Self {
        Graph { nodes, edges }
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn edges(&self) -> &[(String, String)] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.index_of(id).is_some()
    }

    pub fn has_edge(&self, a: &str, b: &str) -> bool {
        self.edges
            .iter()
            .any(|(x, y)| (x == a && y == b) || (x == b && y == a))
    }

    pub fn add_node(&mut self, id: impl Into<String>) -> Result<(), GraphError> {
        let id = id.into();
        if self.contains_node(&id) {
            return Err(GraphError::DuplicateNode(id));
        }
        self.nodes.push(id);
        Ok(())
    }

    /// Adds an undirected edge, rejecting self-loops, duplicates and unknown endpoints.
    pub fn add_edge(&mut self, a: impl Into<String>, b: impl Into<String>) -> Result<(), GraphError> {
        let (a, b) = (a.into(), b.into());
        for id in [&a, &b] {
            if !self.contains_node(id) {
                return Err(GraphError::UnknownNode(id.clone()));
            }
        }
        if a == b {
            return Err(GraphError::SelfLoop(a));
        }
        if self.has_edge(&a, &b) {
            return Err(GraphError::DuplicateEdge(a, b));
        }
        self.edges.push((a, b));
        Ok(())
    }

    /// Removes a node and every edge touching it.
    pub fn remove_node(&mut self, id: &str) -> Result<(), GraphError> {
        let index = self
            .index_of(id)
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))?;
        self.nodes.remove(index);
        self.edges.retain(|(a, b)| a != id && b != id);
        Ok(())
    }

    pub fn remove_edge(&mut self, a: &str, b: &str) -> bool {
        let before = self.edges.len();
        self.edges
            .retain(|(x, y)| !((x == a && y == b) || (x == b && y == a)));
        self.edges.len() != before
    }

    /// Neighbor lists indexed like [`Graph::nodes`]. Each edge is added in both directions.
    ///
    /// Edges naming a node that is not in the graph are skipped.
    pub fn adjacency(&self) -> Vec<Vec<usize>> {
        let index: HashMap<&str, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.as_str(), i))
            .collect();
        let mut adj = vec![Vec::new(); self.nodes.len()];
        for (a, b) in &self.edges {
            match (index.get(a.as_str()), index.get(b.as_str())) {
                (Some(&i), Some(&j)) => {
                    adj[i].push(j);
                    adj[j].push(i);
                }
                _ => tracing::warn!(from = %a, to = %b, "skipping edge with unknown endpoint"),
            }
        }
        adj
    }

    pub fn degree(&self, id: &str) -> Option<usize> {
        self.index_of(id)?;
        Some(
            self.edges
                .iter()
                .filter(|(a, b)| a == id || b == id)
                .count(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_editing() {
        let mut g = Graph::new();
        g.add_node("a").unwrap();
        g.add_node("b").unwrap();
        assert_eq!(g.add_node("a").unwrap_err(), GraphError::DuplicateNode("a".into()));

        g.add_edge("a", "b").unwrap();
        assert_eq!(
            g.add_edge("b", "a").unwrap_err(),
            GraphError::DuplicateEdge("b".into(), "a".into())
        );
        assert_eq!(g.add_edge("a", "a").unwrap_err(), GraphError::SelfLoop("a".into()));
        assert_eq!(g.add_edge("a", "z").unwrap_err(), GraphError::UnknownNode("z".into()));
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.degree("a"), Some(1));
        assert_eq!(g.degree("z"), None);
    }

    #[test]
    fn test_remove_node_drops_edges() {
        let mut g = Graph::new();
        for id in ["a", "b", "c"] {
            g.add_node(id).unwrap();
        }
        g.add_edge("a", "b").unwrap();
        g.add_edge("b", "c").unwrap();
        g.remove_node("b").unwrap();
        assert_eq!(g.nodes(), ["a".to_string(), "c".to_string()]);
        assert_eq!(g.edge_count(), 0);
        assert!(g.remove_node("b").is_err());
    }

    #[test]
    fn test_remove_edge() {
        let mut g = Graph::new();
        g.add_node("a").unwrap();
        g.add_node("b").unwrap();
        g.add_edge("a", "b").unwrap();
        assert!(g.remove_edge("b", "a"));
        assert!(!g.remove_edge("a", "b"));
    }

    #[test]
    fn test_adjacency_is_symmetric_and_skips_unknown() {
        let g = Graph::from_parts(
            vec!["a".into(), "b".into(), "c".into()],
            vec![("a".into(), "b".into()), ("b".into(), "ghost".into())],
        );
        let adj = g.adjacency();
        assert_eq!(adj[0], vec![1]);
        assert_eq!(adj[1], vec![0]);
        assert!(adj[2].is_empty());
    }

    #[test]
    fn test_distance_display_and_serialize() {
        assert_eq!(Distance(3).to_string(), "3");
        assert_eq!(Distance::INFINITY.to_string(), "∞");
        assert_eq!(serde_json::to_string(&Distance(2)).unwrap(), "2");
        assert_eq!(serde_json::to_string(&Distance::INFINITY).unwrap(), "null");
        assert_eq!(Distance::ZERO.increment(), Distance(1));
    }
}
