//! Trail network topology builder and route recommendation engine.
//!
//! `trailnet` turns a raw collection of trail centerlines (3D polylines with
//! metadata) into a clean, routable graph, then searches that graph for routes
//! matching a hiker's target distance and elevation-gain profile.
//!
//! The pipeline runs as a sequence of stages, each consuming an immutable
//! snapshot of the previous stage's output:
//!
//! 1. geometry normalization (duplicate / contained trail removal)
//! 2. iterative intersection resolution (classify and split to a fixpoint)
//! 3. endpoint snapping (closing near-miss gaps between trails)
//! 4. topology building (segments into a vertex/edge graph)
//! 5. degree-2 chain merging (collapsing pass-through vertices)
//! 6. connectivity validation (component report)
//!
//! [`pipeline::build_trail_network`] runs stages 1-6 and produces a
//! [`pipeline::TrailNetwork`]; [`routing::recommend_routes`] searches it for
//! loop, out-and-back and point-to-point candidates.

pub mod config;
pub mod error;
pub mod geometry;
pub mod model;
pub mod pipeline;
pub mod prelude;
pub mod routing;

pub use config::{NetworkConfig, RouteSearchConfig};
pub use error::Error;
pub use model::{Trail, TrailGeometry, TrailGraph, TrailSegment};
pub use pipeline::{TrailNetwork, build_trail_network};
pub use routing::{RoutePattern, RouteRecommendation, RouteShape, recommend_routes};

/// Identifier of a raw ingested trail.
pub type TrailId = u64;

/// Identifier of a trail segment produced by splitting.
pub type SegmentId = u64;

/// Identifier of an edge in the routable graph.
pub type EdgeId = u64;

/// Approximate meters per degree of latitude, used to translate metric
/// tolerances into coordinate-space search radii for spatial index queries.
pub(crate) const METERS_PER_DEGREE: f64 = 111_000.0;
