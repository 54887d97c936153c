//! Bounded enumeration of simple circuits through a root vertex.
//!
//! Depth-first search with a cost ceiling and a shared expansion budget, so
//! dense networks degrade to fewer loop candidates instead of runaway
//! search. Each circuit is reported once: from a given root the direction
//! with the lower first edge index wins, and cross-root duplicates are
//! removed by the caller via the sorted edge-id signature.

use fixedbitset::FixedBitSet;
use itertools::Itertools;
use petgraph::stable_graph::{EdgeIndex, NodeIndex};
use petgraph::visit::{EdgeRef, NodeIndexable};

use crate::model::TrailGraph;

/// A closed walk without repeated vertices or edges.
/// `nodes.len() == edges.len() + 1`, first and last node are the root.
#[derive(Debug, Clone)]
pub(crate) struct Circuit {
    pub nodes: Vec<NodeIndex>,
    pub edges: Vec<EdgeIndex>,
    pub cost: f64,
}

/// All simple circuits through `root` with total length at most `max_cost`.
/// Decrements `budget` once per edge expansion; an exhausted budget stops
/// the search mid-way and keeps what was found.
pub(crate) fn circuits_through(
    graph: &TrailGraph,
    root: NodeIndex,
    max_cost: f64,
    budget: &mut usize,
) -> Vec<Circuit> {
    let mut visited = FixedBitSet::with_capacity(graph.graph.node_bound());
    let mut nodes = vec![root];
    let mut edges = Vec::new();
    let mut out = Vec::new();
    dfs(
        graph, root, root, 0.0, max_cost, &mut visited, &mut nodes, &mut edges, &mut out, budget,
    );
    out
}

#[allow(clippy::too_many_arguments)]
fn dfs(
    graph: &TrailGraph,
    current: NodeIndex,
    root: NodeIndex,
    cost: f64,
    max_cost: f64,
    visited: &mut FixedBitSet,
    nodes: &mut Vec<NodeIndex>,
    edges: &mut Vec<EdgeIndex>,
    out: &mut Vec<Circuit>,
    budget: &mut usize,
) {
    let incident = graph
        .graph
        .edges(current)
        .map(|e| (e.id(), e.target()))
        .sorted()
        .collect::<Vec<_>>();

    for (edge, next) in incident {
        if *budget == 0 {
            return;
        }
        *budget -= 1;

        if edges.contains(&edge) {
            continue;
        }
        let next_cost = cost + graph.graph[edge].length;
        if next_cost > max_cost {
            continue;
        }

        // A self-loop edge is a one-edge circuit at the root.
        if next == current {
            if current == root && edges.is_empty() {
                out.push(Circuit {
                    nodes: vec![root, root],
                    edges: vec![edge],
                    cost: next_cost,
                });
            }
            continue;
        }

        if next == root {
            // Close the circuit; the reversed traversal is suppressed by
            // requiring the opening edge to sort below the closing one.
            if let Some(&first) = edges.first() {
                if first < edge {
                    let mut circuit_nodes = nodes.clone();
                    circuit_nodes.push(root);
                    let mut circuit_edges = edges.clone();
                    circuit_edges.push(edge);
                    out.push(Circuit {
                        nodes: circuit_nodes,
                        edges: circuit_edges,
                        cost: next_cost,
                    });
                }
            }
            continue;
        }

        if visited.contains(next.index()) {
            continue;
        }
        visited.insert(next.index());
        nodes.push(next);
        edges.push(edge);
        dfs(
            graph, next, root, next_cost, max_cost, visited, nodes, edges, out, budget,
        );
        edges.pop();
        nodes.pop();
        visited.remove(next.index());
    }
}
