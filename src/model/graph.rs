//! The routable graph: vertices at segment junctions, edges along segments.

use geo::{Coord, Point};
use hashbrown::HashMap;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableUnGraph};
use petgraph::visit::EdgeRef;

use crate::model::TrailGeometry;
use crate::{EdgeId, METERS_PER_DEGREE, TrailId};

/// A node in the routable graph.
#[derive(Debug, Clone)]
pub struct TrailVertex {
    pub point: Point<f64>,
    pub elevation: f64,
    /// True trail endpoints keep their junction identity and are excluded
    /// from degree-2 chain merging.
    pub pinned: bool,
}

/// An edge in the routable graph.
///
/// Length and elevation always equal the sums over the constituent segments,
/// through both splitting and chain merging.
#[derive(Debug, Clone)]
pub struct TrailEdge {
    pub id: EdgeId,
    pub geometry: TrailGeometry,
    pub length: f64,
    pub elevation_gain: f64,
    pub elevation_loss: f64,
    pub trail_ids: Vec<TrailId>,
    pub trail_names: Vec<String>,
}

/// Undirected graph over trail junctions, with vertex lookup by quantized
/// coordinate. Stable indices survive the removals done by the chain merger.
#[derive(Debug, Clone)]
pub struct TrailGraph {
    pub graph: StableUnGraph<TrailVertex, TrailEdge>,
    key_to_vertex: HashMap<(i64, i64), NodeIndex>,
    key_epsilon_deg: f64,
    next_edge_id: EdgeId,
}

/// Quantizes a coordinate so that points within `epsilon_deg` of each other
/// collapse onto the same key.
pub(crate) fn coord_key(c: Coord<f64>, epsilon_deg: f64) -> (i64, i64) {
    #[allow(clippy::cast_possible_truncation)]
    ((c.x / epsilon_deg).round() as i64, (c.y / epsilon_deg).round() as i64)
}

impl TrailGraph {
    pub fn new(exact_match_epsilon_m: f64) -> Self {
        Self {
            graph: StableUnGraph::default(),
            key_to_vertex: HashMap::new(),
            key_epsilon_deg: exact_match_epsilon_m / METERS_PER_DEGREE,
            next_edge_id: 0,
        }
    }

    pub(crate) fn key_of(&self, c: Coord<f64>) -> (i64, i64) {
        coord_key(c, self.key_epsilon_deg)
    }

    /// Existing vertex at this coordinate, if any.
    pub fn vertex_at(&self, c: Coord<f64>) -> Option<NodeIndex> {
        self.key_to_vertex.get(&self.key_of(c)).copied()
    }

    /// Vertex for this coordinate, creating it on first sight. A later
    /// pinned sighting of an existing vertex upgrades it to pinned.
    pub fn get_or_insert_vertex(
        &mut self,
        c: Coord<f64>,
        elevation: f64,
        pinned: bool,
    ) -> NodeIndex {
        let key = self.key_of(c);
        if let Some(&node) = self.key_to_vertex.get(&key) {
            if pinned {
                if let Some(vertex) = self.graph.node_weight_mut(node) {
                    vertex.pinned = true;
                }
            }
            return node;
        }
        let node = self.graph.add_node(TrailVertex {
            point: Point::from(c),
            elevation,
            pinned,
        });
        self.key_to_vertex.insert(key, node);
        node
    }

    pub fn add_edge(
        &mut self,
        a: NodeIndex,
        b: NodeIndex,
        geometry: TrailGeometry,
        trail_ids: Vec<TrailId>,
        trail_names: Vec<String>,
    ) -> EdgeIndex {
        let edge = TrailEdge {
            id: self.allocate_edge_id(),
            length: geometry.length_m(),
            elevation_gain: geometry.elevation_gain(),
            elevation_loss: geometry.elevation_loss(),
            geometry,
            trail_ids,
            trail_names,
        };
        self.graph.add_edge(a, b, edge)
    }

    /// Inserts an already-assembled edge, preserving its summed attributes.
    /// Used by the chain merger where sums must not be recomputed from the
    /// concatenated geometry.
    pub(crate) fn add_edge_raw(
        &mut self,
        a: NodeIndex,
        b: NodeIndex,
        mut edge: TrailEdge,
    ) -> EdgeIndex {
        edge.id = self.allocate_edge_id();
        self.graph.add_edge(a, b, edge)
    }

    fn allocate_edge_id(&mut self) -> EdgeId {
        let id = self.next_edge_id;
        self.next_edge_id += 1;
        id
    }

    /// Removes a vertex and drops its lookup entry. Incident edges must be
    /// removed by the caller first.
    pub(crate) fn remove_vertex(&mut self, node: NodeIndex) {
        if let Some(vertex) = self.graph.node_weight(node) {
            let key = self.key_of(vertex.point.into());
            self.key_to_vertex.remove(&key);
        }
        self.graph.remove_node(node);
    }

    /// Vertex degree with self-loops counted twice.
    pub fn degree(&self, node: NodeIndex) -> usize {
        self.graph
            .edges(node)
            .map(|e| if e.source() == e.target() { 2 } else { 1 })
            .sum()
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Sum of all edge lengths in meters.
    pub fn total_length(&self) -> f64 {
        self.graph.edge_weights().map(|e| e.length).sum()
    }

    /// The other endpoint of an edge as seen from `from`. For a self-loop
    /// this is `from` itself.
    pub fn opposite_endpoint(&self, edge: EdgeIndex, from: NodeIndex) -> Option<NodeIndex> {
        let (a, b) = self.graph.edge_endpoints(edge)?;
        if a == from { Some(b) } else { Some(a) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrailGeometry;

    fn line(coords: &[(f64, f64, f64)]) -> TrailGeometry {
        TrailGeometry::from_coords(coords)
    }

    #[test]
    fn nearby_coordinates_share_a_vertex() {
        let mut graph = TrailGraph::new(1.0);
        let a = graph.get_or_insert_vertex(Coord { x: 0.0, y: 0.0 }, 10.0, false);
        // 1e-9 degrees is far below the 1 m grouping epsilon.
        let b = graph.get_or_insert_vertex(Coord { x: 1e-9, y: 0.0 }, 10.0, true);
        assert_eq!(a, b);
        assert!(graph.graph[a].pinned, "pinned sighting upgrades the vertex");
    }

    #[test]
    fn self_loop_counts_twice_toward_degree() {
        let mut graph = TrailGraph::new(0.01);
        let a = graph.get_or_insert_vertex(Coord { x: 0.0, y: 0.0 }, 0.0, true);
        graph.add_edge(
            a,
            a,
            line(&[(0.0, 0.0, 0.0), (0.001, 0.0, 0.0), (0.0, 0.001, 0.0), (0.0, 0.0, 0.0)]),
            vec![1],
            vec!["loop".to_string()],
        );
        assert_eq!(graph.degree(a), 2);
    }
}
