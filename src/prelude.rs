// Re-export key components
pub use crate::config::{NetworkConfig, RouteSearchConfig};
pub use crate::error::Error;
pub use crate::model::{Trail, TrailGeometry, TrailGraph, TrailSegment};
pub use crate::pipeline::{
    ConnectivityReport, FixpointReport, RemovalRecord, TrailNetwork, build_trail_network,
};
pub use crate::routing::{RoutePattern, RouteRecommendation, RouteShape, recommend_routes};

// Core identifier types
pub use crate::EdgeId;
pub use crate::SegmentId;
pub use crate::TrailId;
