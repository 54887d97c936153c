//! Degree-2 chain merging: pass-through vertices left over from splitting
//! collapse into single edges with summed attributes.
//!
//! Pinned vertices (true trail endpoints) survive even at degree 2 — they
//! carry junction identity needed downstream. Attribute sums are carried
//! from the constituent edges rather than recomputed from the concatenated
//! geometry, so conservation holds exactly up to floating-point
//! accumulation.

use itertools::Itertools;
use log::{info, warn};
use petgraph::stable_graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::model::{TrailEdge, TrailGeometry, TrailGraph};

pub fn merge_degree2_chains(mut graph: TrailGraph) -> TrailGraph {
    let bound = graph.vertex_count();
    let mut merged = 0usize;

    for _ in 0..bound {
        let Some(vertex) = next_mergeable_vertex(&graph) else {
            break;
        };
        merge_through(&mut graph, vertex);
        merged += 1;
    }

    if next_mergeable_vertex(&graph).is_some() {
        // Each merge removes a vertex, so the bound can only be hit by a
        // logic regression; stop and report rather than loop on.
        warn!("Degree-2 merging stopped at its progress bound with work remaining");
    }
    info!(
        "Merged {merged} pass-through vertices; {} vertices and {} edges remain",
        graph.vertex_count(),
        graph.edge_count()
    );
    graph
}

fn next_mergeable_vertex(graph: &TrailGraph) -> Option<NodeIndex> {
    graph
        .graph
        .node_indices()
        .sorted()
        .find(|&v| is_mergeable(graph, v))
}

fn is_mergeable(graph: &TrailGraph, v: NodeIndex) -> bool {
    if graph.graph[v].pinned {
        return false;
    }
    let incident: Vec<_> = graph.graph.edges(v).map(|e| e.id()).collect();
    // Exactly two distinct plain edges; a self-loop already counts as
    // degree 2 on its own and is never merged through.
    incident.len() == 2
        && incident[0] != incident[1]
        && incident.iter().all(|&e| {
            graph
                .graph
                .edge_endpoints(e)
                .is_some_and(|(s, t)| s != t)
        })
}

fn merge_through(graph: &mut TrailGraph, v: NodeIndex) {
    let mut incident: Vec<EdgeIndex> = graph.graph.edges(v).map(|e| e.id()).collect();
    incident.sort();
    let (e1, e2) = (incident[0], incident[1]);

    let a = graph.opposite_endpoint(e1, v).expect("edge endpoints");
    let b = graph.opposite_endpoint(e2, v).expect("edge endpoints");

    let first = oriented_geometry(graph, e1, v, true);
    let second = oriented_geometry(graph, e2, v, false);
    let w1 = graph.graph[e1].clone();
    let w2 = graph.graph[e2].clone();

    let geometry = concatenate(first, second);
    let trail_ids = w1
        .trail_ids
        .iter()
        .chain(w2.trail_ids.iter())
        .copied()
        .sorted()
        .dedup()
        .collect();
    let trail_names = w1
        .trail_names
        .iter()
        .chain(w2.trail_names.iter())
        .cloned()
        .sorted()
        .dedup()
        .collect();

    let merged = TrailEdge {
        id: 0, // assigned on insert
        length: w1.length + w2.length,
        elevation_gain: w1.elevation_gain + w2.elevation_gain,
        elevation_loss: w1.elevation_loss + w2.elevation_loss,
        geometry,
        trail_ids,
        trail_names,
    };

    graph.graph.remove_edge(e1);
    graph.graph.remove_edge(e2);
    graph.remove_vertex(v);
    graph.add_edge_raw(a, b, merged);
}

/// Geometry of `edge` oriented to end at `v` (`toward = true`) or start at
/// `v` (`toward = false`).
fn oriented_geometry(graph: &TrailGraph, edge: EdgeIndex, v: NodeIndex, toward: bool) -> TrailGeometry {
    let (_, t) = graph.graph.edge_endpoints(edge).expect("edge endpoints");
    let mut geometry = graph.graph[edge].geometry.clone();
    let ends_at_v = t == v;
    if ends_at_v != toward {
        geometry.reverse();
    }
    geometry
}

fn concatenate(mut first: TrailGeometry, second: TrailGeometry) -> TrailGeometry {
    let mut coords = second.line.0.into_iter();
    let mut elevations = second.elevations.into_iter();
    // The junction coordinate appears at the seam of both pieces.
    coords.next();
    elevations.next();
    first.line.0.extend(coords);
    first.elevations.extend(elevations);
    first
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;
    use crate::geometry::meters_to_degrees;
    use crate::model::TrailSegment;
    use crate::model::graph::coord_key;
    use crate::model::{Trail, TrailGeometry};
    use crate::pipeline::topology::{AnchorKeys, build_graph};

    fn segment(id: u64, name: &str, coords: &[(f64, f64, f64)]) -> TrailSegment {
        let trail = Trail::new(id, name, TrailGeometry::from_coords(coords), "t");
        TrailSegment::from_trail(id, &trail)
    }

    #[test]
    fn collapses_split_chain_and_conserves_sums() {
        let config = NetworkConfig::default();
        // Two pieces of the same trail meeting at a non-anchor vertex, as
        // left behind by a split whose other participant was absorbed.
        let segments = vec![
            segment(1, "ridge", &[(0.0, 0.0, 100.0), (0.002, 0.0, 150.0)]),
            segment(2, "ridge", &[(0.002, 0.0, 150.0), (0.004, 0.0, 120.0)]),
        ];
        let epsilon_deg = meters_to_degrees(config.exact_match_epsilon_m);
        let anchors: AnchorKeys = [
            coord_key(geo::Coord { x: 0.0, y: 0.0 }, epsilon_deg),
            coord_key(geo::Coord { x: 0.004, y: 0.0 }, epsilon_deg),
        ]
        .into_iter()
        .collect();

        let before = build_graph(&segments, &anchors, &config);
        let total_before = before.total_length();
        assert_eq!(before.vertex_count(), 3);

        let after = merge_degree2_chains(before);
        assert_eq!(after.vertex_count(), 2);
        assert_eq!(after.edge_count(), 1);
        assert!((after.total_length() - total_before).abs() < 1e-9);

        let edge = after.graph.edge_weights().next().unwrap();
        assert!((edge.elevation_gain - 50.0).abs() < 1e-9);
        assert!((edge.elevation_loss - 30.0).abs() < 1e-9);
        assert_eq!(edge.trail_names, vec!["ridge".to_string()]);
    }

    #[test]
    fn pinned_vertices_survive_at_degree_two() {
        let config = NetworkConfig::default();
        let segments = vec![
            segment(1, "east", &[(0.0, 0.0, 0.0), (0.002, 0.0, 0.0)]),
            segment(2, "west", &[(0.002, 0.0, 0.0), (0.004, 0.0, 0.0)]),
        ];
        let epsilon_deg = meters_to_degrees(config.exact_match_epsilon_m);
        // All three coordinates are true trail endpoints.
        let anchors: AnchorKeys = segments
            .iter()
            .flat_map(|s| [s.geometry.start(), s.geometry.end()])
            .map(|c| coord_key(c, epsilon_deg))
            .collect();

        let graph = merge_degree2_chains(build_graph(&segments, &anchors, &config));
        assert_eq!(graph.vertex_count(), 3, "pinned junction must survive");
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn parallel_pair_collapses_to_self_loop() {
        let config = NetworkConfig::default();
        // Two distinct edges between the same pair of vertices; merging
        // through the non-pinned end turns them into a loop at the other.
        let segments = vec![
            segment(1, "north half", &[(0.0, 0.0, 0.0), (0.001, 0.001, 0.0), (0.002, 0.0, 0.0)]),
            segment(2, "south half", &[(0.0, 0.0, 0.0), (0.001, -0.001, 0.0), (0.002, 0.0, 0.0)]),
        ];
        let epsilon_deg = meters_to_degrees(config.exact_match_epsilon_m);
        let anchors: AnchorKeys = [coord_key(geo::Coord { x: 0.0, y: 0.0 }, epsilon_deg)]
            .into_iter()
            .collect();

        let before = build_graph(&segments, &anchors, &config);
        let total_before = before.total_length();
        let after = merge_degree2_chains(before);
        assert_eq!(after.vertex_count(), 1);
        assert_eq!(after.edge_count(), 1);
        let v = after.graph.node_indices().next().unwrap();
        assert_eq!(after.degree(v), 2, "self-loop counts twice");
        assert!((after.total_length() - total_before).abs() < 1e-9);
    }
}
