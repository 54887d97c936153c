//! End-to-end pipeline scenarios: raw trails in, routable graph out.

use trailnet::prelude::*;

fn trail(id: TrailId, name: &str, coords: &[(f64, f64, f64)]) -> Trail {
    Trail::new(id, name, TrailGeometry::from_coords(coords), "test")
}

fn total_input_length(trails: &[Trail]) -> f64 {
    trails.iter().map(|t| t.length).sum()
}

#[test]
fn shared_endpoint_becomes_one_junction_vertex() {
    // Two trails meeting exactly end-to-start.
    let trails = vec![
        trail(1, "approach", &[(0.0, 0.0, 100.0), (0.004, 0.0, 150.0)]),
        trail(2, "summit", &[(0.004, 0.0, 150.0), (0.004, 0.004, 300.0)]),
    ];
    let network = build_trail_network(trails, &NetworkConfig::default()).unwrap();

    assert_eq!(network.graph.vertex_count(), 3);
    assert_eq!(network.graph.edge_count(), 2);
    let junction = network
        .graph
        .vertex_at(geo::Coord { x: 0.004, y: 0.0 })
        .unwrap();
    assert_eq!(network.graph.degree(junction), 2);
    assert!(
        network.graph.graph[junction].pinned,
        "a true trail endpoint keeps its junction even at degree 2"
    );
    assert!(network.fixpoint.converged);
    assert_eq!(network.connectivity.component_count, 1);
}

#[test]
fn crossing_trails_split_into_four_arms() {
    let trails = vec![
        trail(1, "east-west", &[(-0.002, 0.0, 100.0), (0.002, 0.0, 100.0)]),
        trail(2, "north-south", &[(0.0, -0.002, 100.0), (0.0, 0.002, 100.0)]),
    ];
    let input_length = total_input_length(&trails);
    let network = build_trail_network(trails, &NetworkConfig::default()).unwrap();

    assert_eq!(network.graph.vertex_count(), 5);
    assert_eq!(network.graph.edge_count(), 4);
    let center = network.graph.vertex_at(geo::Coord { x: 0.0, y: 0.0 }).unwrap();
    assert_eq!(network.graph.degree(center), 4);
    assert!(!network.graph.graph[center].pinned);
    assert!(
        (network.graph.total_length() - input_length).abs() < 1e-6,
        "splitting must conserve total length"
    );
    assert!(!network.intersections.is_empty());
}

#[test]
fn t_junction_splits_only_the_stem() {
    let trails = vec![
        trail(1, "main", &[(-0.002, 0.0, 100.0), (0.002, 0.0, 100.0)]),
        trail(2, "spur", &[(0.0, 0.0, 100.0), (0.0, 0.002, 180.0)]),
    ];
    let network = build_trail_network(trails, &NetworkConfig::default()).unwrap();

    assert_eq!(network.graph.vertex_count(), 4);
    assert_eq!(network.graph.edge_count(), 3);
    let junction = network.graph.vertex_at(geo::Coord { x: 0.0, y: 0.0 }).unwrap();
    assert_eq!(network.graph.degree(junction), 3);
    // The spur's own endpoint lands here, so the vertex is pinned.
    assert!(network.graph.graph[junction].pinned);
}

#[test]
fn redundant_parallel_alignment_is_removed() {
    // Same alignment digitized twice, offset by roughly 2 m.
    let original: Vec<(f64, f64, f64)> = (0..5)
        .map(|i| (f64::from(i) * 0.001, 0.0, 100.0))
        .collect();
    let duplicate: Vec<(f64, f64, f64)> = (0..5)
        .map(|i| (f64::from(i) * 0.001, 0.000_02, 100.0))
        .collect();
    let trails = vec![
        trail(1, "river walk", &original),
        trail(2, "river walk (import)", &duplicate),
    ];
    let network = build_trail_network(trails, &NetworkConfig::default()).unwrap();

    assert_eq!(network.removal_log.len(), 1);
    let record = &network.removal_log[0];
    assert!(record.overlap_ratio >= 0.8, "got {}", record.overlap_ratio);
    assert_eq!(network.graph.edge_count(), 1);
    assert_eq!(network.graph.vertex_count(), 2);
}

#[test]
fn near_closed_ring_snaps_into_a_self_loop() {
    // A loop trail whose digitized end stops ~2.2 m short of its start.
    let trails = vec![trail(
        1,
        "lake loop",
        &[
            (0.0, 0.0, 100.0),
            (0.002, 0.0, 110.0),
            (0.002, 0.002, 120.0),
            (0.0, 0.002, 110.0),
            (0.0, 0.000_02, 100.0),
        ],
    )];
    let network = build_trail_network(trails, &NetworkConfig::default()).unwrap();

    assert_eq!(network.graph.vertex_count(), 1);
    assert_eq!(network.graph.edge_count(), 1);
    assert!(network.fixpoint.endpoints_snapped >= 1);
    // The start endpoint yields to the end, so the closure sits at the end
    // coordinate.
    let v = network
        .graph
        .vertex_at(geo::Coord { x: 0.0, y: 0.000_02 })
        .unwrap();
    assert_eq!(network.graph.degree(v), 2, "self-loop counts twice");
}

#[test]
fn facing_endpoint_gap_is_closed_into_one_component() {
    // Two halves of the same route, digitized with a ~3 m gap between the
    // facing ends. Snapping joins them at the earlier endpoint.
    let trails = vec![
        trail(1, "west half", &[(0.0, 0.0, 100.0), (0.001, 0.0, 110.0)]),
        trail(2, "east half", &[(0.001_027, 0.0, 110.0), (0.002, 0.0, 120.0)]),
    ];
    let network = build_trail_network(trails, &NetworkConfig::default()).unwrap();

    assert_eq!(network.fixpoint.endpoints_snapped, 1);
    assert!(network.fixpoint.converged);
    assert_eq!(network.connectivity.component_count, 1);
    assert_eq!(network.graph.vertex_count(), 3);
    assert_eq!(network.graph.edge_count(), 2);
    assert!(network.unresolved_overlaps.is_empty());
    let junction = network.graph.vertex_at(geo::Coord { x: 0.001, y: 0.0 }).unwrap();
    assert_eq!(network.graph.degree(junction), 2);
    assert!(network.graph.graph[junction].pinned);
}

#[test]
fn absorbed_sliver_leaves_no_spurious_junction() {
    // The crossing sits ~5.5 m from the overshooting trail's end: too short
    // to survive as a segment, too far to snap. The stem is split and then
    // re-merged, so no unpinned degree-2 vertex survives.
    let trails = vec![
        trail(1, "main", &[(-0.002, 0.0, 100.0), (0.002, 0.0, 100.0)]),
        trail(2, "overshoot", &[(0.0, -0.002, 100.0), (0.0, 0.000_05, 100.0)]),
    ];
    let network = build_trail_network(trails, &NetworkConfig::default()).unwrap();

    for v in network.graph.graph.node_indices() {
        let vertex = &network.graph.graph[v];
        assert!(
            vertex.pinned || network.graph.degree(v) != 2,
            "unpinned degree-2 vertex survived merging"
        );
    }
    // Without a materialized junction the two trails stay separate.
    assert_eq!(network.connectivity.component_count, 2);
    assert_eq!(network.graph.edge_count(), 2);
}

#[test]
fn degenerate_and_valid_trails_mix_without_error() {
    // A zero-length trail is skipped with a warning, not a failure.
    let trails = vec![
        trail(1, "point", &[(0.05, 0.05, 100.0), (0.05, 0.05, 100.0)]),
        trail(2, "real", &[(0.0, 0.0, 100.0), (0.002, 0.0, 120.0)]),
    ];
    let network = build_trail_network(trails, &NetworkConfig::default()).unwrap();
    assert_eq!(network.graph.edge_count(), 1);
    assert_eq!(network.graph.vertex_count(), 2);
}

#[test]
fn duplicate_trail_ids_are_rejected() {
    let trails = vec![
        trail(7, "a", &[(0.0, 0.0, 0.0), (0.001, 0.0, 0.0)]),
        trail(7, "b", &[(0.0, 0.01, 0.0), (0.001, 0.01, 0.0)]),
    ];
    let err = build_trail_network(trails, &NetworkConfig::default()).unwrap_err();
    assert!(matches!(err, Error::InvalidData(_)));
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let config = NetworkConfig {
        snap_tolerance_m: -1.0,
        ..NetworkConfig::default()
    };
    let trails = vec![trail(1, "a", &[(0.0, 0.0, 0.0), (0.001, 0.0, 0.0)])];
    let err = build_trail_network(trails, &config).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn dense_junction_network_conserves_length_and_converges() {
    // A ladder of crossings exercising repeated split passes.
    let trails = vec![
        trail(1, "rail", &[(-0.004, 0.0, 100.0), (0.004, 0.0, 100.0)]),
        trail(2, "rung a", &[(-0.002, -0.002, 100.0), (-0.002, 0.002, 100.0)]),
        trail(3, "rung b", &[(0.0, -0.002, 100.0), (0.0, 0.002, 100.0)]),
        trail(4, "rung c", &[(0.002, -0.002, 100.0), (0.002, 0.002, 100.0)]),
    ];
    let input_length = total_input_length(&trails);
    let network = build_trail_network(trails, &NetworkConfig::default()).unwrap();

    assert!(network.fixpoint.converged);
    assert!(
        (network.graph.total_length() - input_length).abs() < 1e-6,
        "expected {input_length}, got {}",
        network.graph.total_length()
    );
    // Three crossings on the rail, each degree 4.
    let crossings = [-0.002, 0.0, 0.002];
    for x in crossings {
        let v = network.graph.vertex_at(geo::Coord { x, y: 0.0 }).unwrap();
        assert_eq!(network.graph.degree(v), 4);
    }
    assert_eq!(network.connectivity.component_count, 1);
}

#[test]
fn split_endpoints_are_trail_ends_or_recorded_intersections() {
    // Every surviving segment endpoint must be explainable: either an
    // original trail endpoint or a meeting point the resolver recorded.
    let trails = vec![
        trail(1, "rail", &[(-0.004, 0.0, 100.0), (0.004, 0.0, 100.0)]),
        trail(2, "rung a", &[(-0.002, -0.002, 100.0), (-0.002, 0.002, 100.0)]),
        trail(3, "rung b", &[(0.0, -0.002, 100.0), (0.0, 0.002, 100.0)]),
        trail(4, "spur", &[(0.001, 0.0, 100.0), (0.001, 0.002, 100.0)]),
    ];
    let mut anchors: Vec<geo::Coord<f64>> = trails
        .iter()
        .flat_map(|t| [t.geometry.start(), t.geometry.end()])
        .collect();
    let network = build_trail_network(trails, &NetworkConfig::default()).unwrap();
    anchors.extend(network.intersections.iter().map(|i| i.point));

    let close = |a: geo::Coord<f64>, b: geo::Coord<f64>| {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    };
    for segment in &network.segments {
        for endpoint in [segment.geometry.start(), segment.geometry.end()] {
            assert!(
                anchors.iter().any(|&a| close(a, endpoint)),
                "segment {} has a dangling endpoint at ({}, {})",
                segment.id,
                endpoint.x,
                endpoint.y
            );
        }
    }
}

#[test]
fn fragmented_input_is_reported_not_rejected() {
    let trails = vec![
        trail(1, "north island", &[(0.0, 0.1, 100.0), (0.002, 0.1, 120.0)]),
        trail(2, "south island", &[(0.0, -0.1, 100.0), (0.002, -0.1, 90.0)]),
    ];
    let network = build_trail_network(trails, &NetworkConfig::default()).unwrap();
    assert_eq!(network.connectivity.component_count, 2);
    assert_eq!(network.connectivity.component_sizes, vec![2, 2]);
    assert_eq!(network.connectivity.dead_end_vertices.len(), 4);
}
