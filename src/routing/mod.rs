//! Route recommendation over the finished trail network.
//!
//! Candidate generation is shape-specific (circuit enumeration for loops,
//! k-shortest paths for out-and-back and point-to-point), then all shapes
//! share the same scoring, deduplication, and ranking.

mod circuits;
mod dijkstra;
mod ksp;
mod recommend;

pub use recommend::{RoutePattern, RouteRecommendation, RouteShape, recommend_routes};
