//! Shortest paths by length over the trail graph, with the predecessor
//! tracing needed to recover edge sequences.

use std::{cmp::Ordering, collections::BinaryHeap};

use hashbrown::{HashMap, HashSet};
use petgraph::stable_graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::model::TrailGraph;

#[derive(Copy, Clone, PartialEq)]
struct State {
    cost: f64,
    node: NodeIndex,
}

impl Eq for State {}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap by cost (reversed from standard Rust BinaryHeap), with
        // the node index as a deterministic tiebreaker.
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A traced path: `nodes.len() == edges.len() + 1`, cost in meters.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PathResult {
    pub nodes: Vec<NodeIndex>,
    pub edges: Vec<EdgeIndex>,
    pub cost: f64,
}

/// Dijkstra from `start` to `target` over edge lengths, honoring banned
/// vertices and edges. Self-loop edges never shorten a path and are skipped.
pub(crate) fn shortest_path(
    graph: &TrailGraph,
    start: NodeIndex,
    target: NodeIndex,
    banned_nodes: &HashSet<NodeIndex>,
    banned_edges: &HashSet<EdgeIndex>,
    max_cost: Option<f64>,
) -> Option<PathResult> {
    if banned_nodes.contains(&start) || banned_nodes.contains(&target) {
        return None;
    }
    if start == target {
        return Some(PathResult {
            nodes: vec![start],
            edges: Vec::new(),
            cost: 0.0,
        });
    }

    let mut distances: HashMap<NodeIndex, f64> = HashMap::new();
    let mut predecessors: HashMap<NodeIndex, (NodeIndex, EdgeIndex)> = HashMap::new();
    let mut heap = BinaryHeap::new();

    distances.insert(start, 0.0);
    heap.push(State {
        cost: 0.0,
        node: start,
    });

    while let Some(State { cost, node }) = heap.pop() {
        if node == target {
            break;
        }
        if let Some(&best) = distances.get(&node) {
            if cost > best {
                continue;
            }
        }

        for edge in graph.graph.edges(node) {
            let next = edge.target();
            if next == node || banned_nodes.contains(&next) || banned_edges.contains(&edge.id()) {
                continue;
            }
            let next_cost = cost + edge.weight().length;
            if let Some(max) = max_cost {
                if next_cost > max {
                    continue;
                }
            }

            match distances.entry(next) {
                hashbrown::hash_map::Entry::Vacant(entry) => {
                    entry.insert(next_cost);
                    predecessors.insert(next, (node, edge.id()));
                    heap.push(State {
                        cost: next_cost,
                        node: next,
                    });
                }
                hashbrown::hash_map::Entry::Occupied(mut entry) => {
                    if next_cost < *entry.get() {
                        *entry.get_mut() = next_cost;
                        predecessors.insert(next, (node, edge.id()));
                        heap.push(State {
                            cost: next_cost,
                            node: next,
                        });
                    }
                }
            }
        }
    }

    let cost = *distances.get(&target)?;
    let mut nodes = vec![target];
    let mut edges = Vec::new();
    let mut current = target;
    while current != start {
        let &(prev, edge) = predecessors.get(&current)?;
        nodes.push(prev);
        edges.push(edge);
        current = prev;
    }
    nodes.reverse();
    edges.reverse();
    Some(PathResult { nodes, edges, cost })
}
