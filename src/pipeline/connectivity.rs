//! Connectivity validation: a read-only component report over the
//! simplified graph.
//!
//! The report tells downstream consumers whether connector remediation is
//! needed; building connectors is outside this crate.

use log::warn;
use petgraph::stable_graph::NodeIndex;
use rustworkx_core::connectivity::connected_components;

use crate::model::TrailGraph;

#[derive(Debug, Clone)]
pub struct ConnectivityReport {
    pub component_count: usize,
    /// Component sizes in vertices, largest first.
    pub component_sizes: Vec<usize>,
    /// Vertices with no incident edges.
    pub isolated_vertices: Vec<NodeIndex>,
    /// Vertices with exactly one incident edge.
    pub dead_end_vertices: Vec<NodeIndex>,
}

pub fn validate_connectivity(graph: &TrailGraph) -> ConnectivityReport {
    let components = connected_components(&graph.graph);
    let mut component_sizes: Vec<usize> = components.iter().map(|c| c.len()).collect();
    component_sizes.sort_unstable_by(|a, b| b.cmp(a));

    let mut isolated_vertices = Vec::new();
    let mut dead_end_vertices = Vec::new();
    for v in graph.graph.node_indices() {
        match graph.degree(v) {
            0 => isolated_vertices.push(v),
            1 => dead_end_vertices.push(v),
            _ => {}
        }
    }
    isolated_vertices.sort();
    dead_end_vertices.sort();

    let component_count = component_sizes.len();
    if component_count > 1 {
        warn!(
            "Trail graph is fragmented: {component_count} components with sizes {component_sizes:?}"
        );
    }

    ConnectivityReport {
        component_count,
        component_sizes,
        isolated_vertices,
        dead_end_vertices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;
    use crate::model::{Trail, TrailGeometry, TrailSegment};
    use crate::pipeline::topology::{AnchorKeys, build_graph};

    fn segment(id: u64, coords: &[(f64, f64, f64)]) -> TrailSegment {
        let trail = Trail::new(id, format!("trail-{id}"), TrailGeometry::from_coords(coords), "t");
        TrailSegment::from_trail(id, &trail)
    }

    #[test]
    fn reports_fragmentation_and_dead_ends() {
        let config = NetworkConfig::default();
        let segments = vec![
            segment(1, &[(0.0, 0.0, 0.0), (0.002, 0.0, 0.0)]),
            segment(2, &[(0.01, 0.01, 0.0), (0.012, 0.01, 0.0)]),
        ];
        let graph = build_graph(&segments, &AnchorKeys::new(), &config);
        let report = validate_connectivity(&graph);
        assert_eq!(report.component_count, 2);
        assert_eq!(report.component_sizes, vec![2, 2]);
        assert_eq!(report.dead_end_vertices.len(), 4);
        assert!(report.isolated_vertices.is_empty());
    }
}
