// src/graph/metrics.rs

//! Breadth-first distances and the summary statistics derived from them.
//!
//! Everything is recomputed from the edge list on each call; nothing is cached
//! between calls.

use std::collections::VecDeque;

use ndarray::Array2;
use serde::Serialize;

use super::{Distance, Graph, GraphError};
use crate::EngineResult;

/// Summary statistics of a graph's shortest-path distances.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphMetrics {
    /// Per node, the largest finite distance to any other node (0 when isolated).
    pub eccentricities: Vec<u32>,
    pub diameter: u32,
    pub radius: u32,
    /// Mean over reachable unordered pairs only. Unreachable pairs are left out.
    pub average_distance: f64,
    pub reachable_pairs: usize,
}

/// BFS from `source`. The `INFINITY` sentinel doubles as the unvisited marker.
fn bfs_from(adj: &[Vec<usize>], source: usize) -> Vec<Distance> {
    let mut distances = vec![Distance::INFINITY; adj.len()];
    let mut queue = VecDeque::new();
    distances[source] = Distance::ZERO;
    queue.push_back(source);

    while let Some(node) = queue.pop_front() {
        let next = distances[node].increment();
        for &neighbor in &adj[node] {
            if distances[neighbor] == Distance::INFINITY {
                distances[neighbor] = next;
                queue.push_back(neighbor);
            }
        }
    }

    distances
}

/// Hop distance from `start` to every node, in [`Graph::nodes`] order.
pub fn bfs_distances(graph: &Graph, start: &str) -> EngineResult<Vec<Distance>> {
    let source = graph
        .index_of(start)
        .ok_or_else(|| GraphError::UnknownNode(start.to_string()))?;
    Ok(bfs_from(&graph.adjacency(), source))
}

/// All-pairs hop distances, one BFS per node.
pub fn distance_matrix(graph: &Graph) -> Array2<Distance> {
    let n = graph.node_count();
    let adj = graph.adjacency();
    let mut matrix = Array2::from_elem((n, n), Distance::INFINITY);
    for source in 0..n {
        for (target, d) in bfs_from(&adj, source).into_iter().enumerate() {
            matrix[[source, target]] = d;
        }
    }
    matrix
}

/// Eccentricity, diameter, radius and average distance from a distance matrix.
pub fn metrics_from_distances(matrix: &Array2<Distance>) -> GraphMetrics {
    let n = matrix.nrows();

    let eccentricities: Vec<u32> = matrix
        .rows()
        .into_iter()
        .map(|row| row.iter().filter_map(Distance::hops).max().unwrap_or(0))
        .collect();

    let mut total = 0u64;
    let mut reachable_pairs = 0usize;
    for i in 0..n {
        for j in i + 1..n {
            if let Some(d) = matrix[[i, j]].hops() {
                total += u64::from(d);
                reachable_pairs += 1;
            }
        }
    }

    let average_distance = if reachable_pairs == 0 {
        0.0
    } else {
        total as f64 / reachable_pairs as f64
    };

    GraphMetrics {
        diameter: eccentricities.iter().copied().max().unwrap_or(0),
        radius: eccentricities.iter().copied().min().unwrap_or(0),
        eccentricities,
        average_distance,
        reachable_pairs,
    }
}

pub fn graph_metrics(graph: &Graph) -> GraphMetrics {
    let metrics = metrics_from_distances(&distance_matrix(graph));
    tracing::debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        diameter = metrics.diameter,
        radius = metrics.radius,
        "computed graph metrics"
    );
    metrics
}

/// One shortest path from `from` to `to`, endpoints included. `None` when unreachable.
pub fn shortest_path(graph: &Graph, from: &str, to: &str) -> EngineResult<Option<Vec<String>>> {
    let source = graph
        .index_of(from)
        .ok_or_else(|| GraphError::UnknownNode(from.to_string()))?;
    let target = graph
        .index_of(to)
        .ok_or_else(|| GraphError::UnknownNode(to.to_string()))?;

    let adj = graph.adjacency();
    let mut parents: Vec<Option<usize>> = vec![None; adj.len()];
    let mut visited = vec![false; adj.len()];
    let mut queue = VecDeque::new();
    visited[source] = true;
    queue.push_back(source);

    while let Some(node) = queue.pop_front() {
        if node == target {
            break;
        }
        for &neighbor in &adj[node] {
            if !visited[neighbor] {
                visited[neighbor] = true;
                parents[neighbor] = Some(node);
                queue.push_back(neighbor);
            }
        }
    }

    if !visited[target] {
        return Ok(None);
    }

    let mut path = vec![target];
    let mut current = target;
    while let Some(parent) = parents[current] {
        path.push(parent);
        current = parent;
    }
    path.reverse();

    let nodes = graph.nodes();
    Ok(Some(path.into_iter().map(|i| nodes[i].clone()).collect()))
}

/// Groups of mutually reachable node ids, in order of first appearance.
pub fn connected_components(graph: &Graph) -> Vec<Vec<String>> {
    let adj = graph.adjacency();
    let mut seen = vec![false; adj.len()];
    let mut components = Vec::new();

    for start in 0..adj.len() {
        if seen[start] {
            continue;
        }
        let distances = bfs_from(&adj, start);
        let members: Vec<String> = distances
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_finite())
            .map(|(i, _)| {
                seen[i] = true;
                graph.nodes()[i].clone()
            })
            .collect();
        components.push(members);
    }

    components
}
