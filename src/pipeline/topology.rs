//! Topology building: the final segment set becomes a vertex/edge graph.
//!
//! Endpoints are grouped by quantized coordinate equality (splitting and
//! snapping have already made touching endpoints exactly coincident within
//! the exact-match epsilon), each segment becomes one edge, and exact
//! duplicate edges are dropped defensively with a warning since they
//! indicate a normalization failure upstream.

use hashbrown::HashSet;
use log::{info, warn};

use crate::config::NetworkConfig;
use crate::geometry::meters_to_degrees;
use crate::model::graph::coord_key;
use crate::model::{TrailGraph, TrailSegment};

/// Quantized coordinates of original (pre-split) trail endpoints. Vertices
/// landing on these keys are pinned: they carry trailhead identity and are
/// never merged away by the degree-2 chain merger.
pub(crate) type AnchorKeys = HashSet<(i64, i64)>;

pub fn build_graph(
    segments: &[TrailSegment],
    anchors: &AnchorKeys,
    config: &NetworkConfig,
) -> TrailGraph {
    let mut graph = TrailGraph::new(config.exact_match_epsilon_m);
    let epsilon_deg = meters_to_degrees(config.exact_match_epsilon_m);
    let mut dropped = 0usize;

    for segment in segments {
        let start = segment.geometry.start();
        let end = segment.geometry.end();
        let a = graph.get_or_insert_vertex(
            start,
            segment.geometry.start_elevation(),
            anchors.contains(&coord_key(start, epsilon_deg)),
        );
        let b = graph.get_or_insert_vertex(
            end,
            segment.geometry.end_elevation(),
            anchors.contains(&coord_key(end, epsilon_deg)),
        );

        if has_identical_edge(&graph, a, b, segment, epsilon_deg) {
            warn!(
                "Dropping duplicate edge for segment {} between identical endpoints \
                 (upstream normalization should have removed this)",
                segment.id
            );
            dropped += 1;
            continue;
        }

        graph.add_edge(
            a,
            b,
            segment.geometry.clone(),
            vec![segment.trail_id],
            vec![segment.trail_name.clone()],
        );
    }

    info!(
        "Built graph with {} vertices and {} edges ({} duplicate edges dropped)",
        graph.vertex_count(),
        graph.edge_count(),
        dropped
    );
    graph
}

/// True when an edge with the same endpoints and the same (possibly
/// reversed) quantized geometry already exists.
fn has_identical_edge(
    graph: &TrailGraph,
    a: petgraph::stable_graph::NodeIndex,
    b: petgraph::stable_graph::NodeIndex,
    segment: &TrailSegment,
    epsilon_deg: f64,
) -> bool {
    use petgraph::visit::EdgeRef;

    graph
        .graph
        .edges(a)
        .filter(|e| {
            (e.source() == a && e.target() == b) || (e.source() == b && e.target() == a)
        })
        .any(|e| {
            same_quantized_line(&e.weight().geometry.line, &segment.geometry.line, epsilon_deg)
        })
}

fn same_quantized_line(
    a: &geo::LineString<f64>,
    b: &geo::LineString<f64>,
    epsilon_deg: f64,
) -> bool {
    if a.0.len() != b.0.len() {
        return false;
    }
    let keys_a: Vec<_> = a.0.iter().map(|&c| coord_key(c, epsilon_deg)).collect();
    let keys_b: Vec<_> = b.0.iter().map(|&c| coord_key(c, epsilon_deg)).collect();
    let mut reversed = keys_b.clone();
    reversed.reverse();
    keys_a == keys_b || keys_a == reversed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Trail, TrailGeometry};

    fn segment(id: u64, coords: &[(f64, f64, f64)]) -> TrailSegment {
        let trail = Trail::new(id, format!("trail-{id}"), TrailGeometry::from_coords(coords), "t");
        TrailSegment::from_trail(id, &trail)
    }

    fn anchors_for(segments: &[TrailSegment], config: &NetworkConfig) -> AnchorKeys {
        let epsilon_deg = meters_to_degrees(config.exact_match_epsilon_m);
        segments
            .iter()
            .flat_map(|s| [s.geometry.start(), s.geometry.end()])
            .map(|c| coord_key(c, epsilon_deg))
            .collect()
    }

    #[test]
    fn shared_endpoint_yields_one_vertex() {
        let config = NetworkConfig::default();
        let segments = vec![
            segment(1, &[(0.0, 0.0, 0.0), (0.002, 0.0, 0.0)]),
            segment(2, &[(0.002, 0.0, 0.0), (0.002, 0.002, 0.0)]),
        ];
        let anchors = anchors_for(&segments, &config);
        let graph = build_graph(&segments, &anchors, &config);
        assert_eq!(graph.vertex_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        let shared = graph.vertex_at(geo::Coord { x: 0.002, y: 0.0 }).unwrap();
        assert_eq!(graph.degree(shared), 2);
        assert!(graph.graph[shared].pinned);
    }

    #[test]
    fn exact_duplicate_edges_are_dropped() {
        let config = NetworkConfig::default();
        let segments = vec![
            segment(1, &[(0.0, 0.0, 0.0), (0.002, 0.0, 0.0)]),
            segment(2, &[(0.0, 0.0, 0.0), (0.002, 0.0, 0.0)]),
        ];
        let anchors = anchors_for(&segments, &config);
        let graph = build_graph(&segments, &anchors, &config);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn closed_ring_becomes_a_self_loop() {
        let config = NetworkConfig::default();
        let segments = vec![segment(
            1,
            &[
                (0.0, 0.0, 0.0),
                (0.002, 0.0, 0.0),
                (0.002, 0.002, 0.0),
                (0.0, 0.002, 0.0),
                (0.0, 0.0, 0.0),
            ],
        )];
        let anchors = anchors_for(&segments, &config);
        let graph = build_graph(&segments, &anchors, &config);
        assert_eq!(graph.vertex_count(), 1);
        assert_eq!(graph.edge_count(), 1);
        let v = graph.vertex_at(geo::Coord { x: 0.0, y: 0.0 }).unwrap();
        assert_eq!(graph.degree(v), 2);
    }
}
