//! The topology-building pipeline, stage by stage.
//!
//! Each stage consumes the complete, immutable output of the previous one
//! and returns a new snapshot; nothing mutates shared state across stages.
//! [`build_trail_network`] wires them together:
//! normalization → (intersection resolution ⇄ endpoint snapping) →
//! topology building → degree-2 merging → connectivity validation.

pub mod connectivity;
pub mod intersections;
pub mod normalize;
pub mod simplify;
pub mod snapping;
pub mod topology;

use hashbrown::HashSet;
use log::{info, warn};

use crate::config::NetworkConfig;
use crate::geometry::meters_to_degrees;
use crate::model::graph::coord_key;
use crate::model::{Trail, TrailGraph, TrailSegment};
use crate::{Error, SegmentId};

pub use connectivity::ConnectivityReport;
pub use intersections::{IntersectionKind, RawIntersection};
pub use normalize::RemovalRecord;

/// Monotonic segment-id source, owned by one pipeline run.
#[derive(Debug)]
pub struct SegmentIds(SegmentId);

impl SegmentIds {
    pub fn starting_at(first: SegmentId) -> Self {
        Self(first)
    }

    pub fn next(&mut self) -> SegmentId {
        let id = self.0;
        self.0 += 1;
        id
    }
}

/// How the resolve/snap fixpoint ended.
#[derive(Debug, Clone, Copy)]
pub struct FixpointReport {
    /// False when the iteration bound cut the loop short.
    pub converged: bool,
    /// Total classify-and-split passes across all resolve rounds.
    pub resolver_passes: usize,
    /// Resolve/snap rounds run by the orchestrator.
    pub rounds: usize,
    /// Endpoints moved by snapping over the whole run.
    pub endpoints_snapped: usize,
}

/// The finished routable network plus everything needed to audit how it
/// was produced.
#[derive(Debug)]
pub struct TrailNetwork {
    pub graph: TrailGraph,
    /// The frozen segment set the graph was built from.
    pub segments: Vec<TrailSegment>,
    pub removal_log: Vec<RemovalRecord>,
    pub intersections: Vec<RawIntersection>,
    /// Parallel-overlap pairs that could not be split; flagged, not dropped.
    pub unresolved_overlaps: Vec<(SegmentId, SegmentId)>,
    pub fixpoint: FixpointReport,
    pub connectivity: ConnectivityReport,
}

/// Runs the full pipeline over a raw trail collection.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] for invalid tolerances and
/// [`Error::InvalidData`] for duplicate trail ids. Geometric trouble in
/// individual pairs is logged and worked around, never fatal.
pub fn build_trail_network(
    trails: Vec<Trail>,
    config: &NetworkConfig,
) -> Result<TrailNetwork, Error> {
    config.validate()?;
    check_unique_ids(&trails)?;

    info!("Building trail network from {} trails", trails.len());
    let trails: Vec<Trail> = trails
        .into_iter()
        .filter(|t| {
            if t.length > 0.0 {
                return true;
            }
            warn!("Skipping trail {} ({}): zero-length geometry", t.id, t.name);
            false
        })
        .collect();
    let (trails, removal_log) = normalize::normalize_trails(trails, config);
    info!(
        "{} trails survive normalization ({} removed)",
        trails.len(),
        removal_log.len()
    );

    // True trail endpoints, recorded before any splitting: these pin their
    // vertices against degree-2 merging.
    let epsilon_deg = meters_to_degrees(config.exact_match_epsilon_m);
    let anchors: topology::AnchorKeys = trails
        .iter()
        .flat_map(|t| [t.geometry.start(), t.geometry.end()])
        .map(|c| coord_key(c, epsilon_deg))
        .collect();

    let mut ids = SegmentIds::starting_at(1);
    let mut segments: Vec<TrailSegment> = trails
        .iter()
        .map(|t| TrailSegment::from_trail(ids.next(), t))
        .collect();

    let mut intersections = Vec::new();
    let mut unresolved_overlaps = Vec::new();
    let mut resolver_passes = 0;
    let mut rounds = 0;
    let mut endpoints_snapped = 0;
    let mut converged = false;

    // Snapping can create new exact intersections, so resolution and
    // snapping alternate until neither has work left, under the same
    // explicit bound as the resolver's internal fixpoint.
    while rounds < config.max_fixpoint_iterations {
        rounds += 1;
        let outcome = intersections::resolve_intersections(segments, &mut ids, config);
        resolver_passes += outcome.iterations;
        intersections.extend(outcome.intersections);
        unresolved_overlaps = outcome.unresolved_overlaps;
        let resolver_converged = outcome.converged;

        let (snapped_segments, moved) = snapping::snap_endpoints(outcome.segments, config);
        segments = snapped_segments;
        endpoints_snapped += moved;

        if moved == 0 {
            converged = resolver_converged;
            break;
        }
    }
    if !converged {
        warn!(
            "Resolve/snap loop stopped at the {} round bound without quiescing",
            config.max_fixpoint_iterations
        );
    }

    let graph = topology::build_graph(&segments, &anchors, config);
    let graph = simplify::merge_degree2_chains(graph);
    let connectivity = connectivity::validate_connectivity(&graph);

    Ok(TrailNetwork {
        graph,
        segments,
        removal_log,
        intersections,
        unresolved_overlaps,
        fixpoint: FixpointReport {
            converged,
            resolver_passes,
            rounds,
            endpoints_snapped,
        },
        connectivity,
    })
}

fn check_unique_ids(trails: &[Trail]) -> Result<(), Error> {
    let mut seen = HashSet::with_capacity(trails.len());
    for trail in trails {
        if !seen.insert(trail.id) {
            return Err(Error::InvalidData(format!(
                "duplicate trail id {} in input",
                trail.id
            )));
        }
    }
    Ok(())
}
