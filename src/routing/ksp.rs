//! Yen's k-shortest simple paths, built on the traced Dijkstra.

use hashbrown::HashSet;
use petgraph::stable_graph::NodeIndex;

use super::dijkstra::{PathResult, shortest_path};
use crate::model::TrailGraph;

/// Up to `k` loopless paths from `start` to `target` in ascending cost
/// order, all within `max_cost` when given.
pub(crate) fn k_shortest_paths(
    graph: &TrailGraph,
    start: NodeIndex,
    target: NodeIndex,
    k: usize,
    max_cost: Option<f64>,
) -> Vec<PathResult> {
    let empty_nodes = HashSet::new();
    let empty_edges = HashSet::new();

    let Some(first) = shortest_path(graph, start, target, &empty_nodes, &empty_edges, max_cost)
    else {
        return Vec::new();
    };
    let mut shortest: Vec<PathResult> = vec![first];
    let mut candidates: Vec<PathResult> = Vec::new();

    while shortest.len() < k {
        let previous = shortest.last().expect("at least one path").clone();

        for i in 0..previous.nodes.len() - 1 {
            let spur_node = previous.nodes[i];
            let root_nodes = &previous.nodes[..=i];
            let root_edges = &previous.edges[..i];
            let root_cost: f64 = root_edges.iter().map(|&e| graph.graph[e].length).sum();

            // Ban the edges that would reproduce an already-found path from
            // this root, and the root's interior vertices.
            let mut banned_edges = HashSet::new();
            for path in &shortest {
                if path.nodes.len() > i && path.nodes[..=i] == *root_nodes {
                    if let Some(&edge) = path.edges.get(i) {
                        banned_edges.insert(edge);
                    }
                }
            }
            let banned_nodes: HashSet<_> = root_nodes[..i].iter().copied().collect();

            let spur_max = max_cost.map(|max| max - root_cost);
            if spur_max.is_some_and(|max| max < 0.0) {
                continue;
            }
            let Some(spur) = shortest_path(
                graph,
                spur_node,
                target,
                &banned_nodes,
                &banned_edges,
                spur_max,
            ) else {
                continue;
            };

            let mut nodes = root_nodes.to_vec();
            nodes.extend_from_slice(&spur.nodes[1..]);
            let mut edges = root_edges.to_vec();
            edges.extend_from_slice(&spur.edges);
            let total = PathResult {
                nodes,
                edges,
                cost: root_cost + spur.cost,
            };

            let duplicate = shortest
                .iter()
                .chain(candidates.iter())
                .any(|p| p.edges == total.edges);
            if !duplicate {
                candidates.push(total);
            }
        }

        if candidates.is_empty() {
            break;
        }
        candidates.sort_by(|a, b| a.cost.total_cmp(&b.cost).then_with(|| a.edges.cmp(&b.edges)));
        shortest.push(candidates.remove(0));
    }

    shortest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrailGeometry;
    use geo::Coord;

    fn diamond() -> (TrailGraph, NodeIndex, NodeIndex) {
        // Two disjoint routes between the same endpoints, one shorter.
        let mut graph = TrailGraph::new(0.01);
        let a = graph.get_or_insert_vertex(Coord { x: 0.0, y: 0.0 }, 0.0, true);
        let n = graph.get_or_insert_vertex(Coord { x: 0.002, y: 0.001 }, 0.0, true);
        let s = graph.get_or_insert_vertex(Coord { x: 0.002, y: -0.003 }, 0.0, true);
        let b = graph.get_or_insert_vertex(Coord { x: 0.004, y: 0.0 }, 0.0, true);
        for (u, v, via) in [
            (a, n, (0.002, 0.001)),
            (n, b, (0.002, 0.001)),
            (a, s, (0.002, -0.003)),
            (s, b, (0.002, -0.003)),
        ] {
            let pu = graph.graph[u].point;
            let pv = graph.graph[v].point;
            let line = TrailGeometry::from_coords(&[
                (pu.x(), pu.y(), 0.0),
                (via.0, via.1, 0.0),
                (pv.x(), pv.y(), 0.0),
            ]);
            graph.add_edge(u, v, line, vec![1], vec!["t".to_string()]);
        }
        (graph, a, b)
    }

    #[test]
    fn returns_alternatives_in_cost_order() {
        let (graph, a, b) = diamond();
        let paths = k_shortest_paths(&graph, a, b, 3, None);
        assert_eq!(paths.len(), 2, "only two simple routes exist");
        assert!(paths[0].cost <= paths[1].cost);
        assert_ne!(paths[0].edges, paths[1].edges);
    }

    #[test]
    fn cost_ceiling_drops_the_longer_alternative() {
        let (graph, a, b) = diamond();
        let all = k_shortest_paths(&graph, a, b, 3, None);
        let ceiling = (all[0].cost + all[1].cost) / 2.0;
        let paths = k_shortest_paths(&graph, a, b, 3, Some(ceiling));
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].edges, all[0].edges);
    }
}
