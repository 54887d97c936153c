//! Data model for the trail network pipeline
//!
//! Contains the raw trail record, the split segment representation and the
//! routable graph built from the final segment set.

pub mod graph;
pub mod segment;
pub mod trail;

pub use graph::{TrailEdge, TrailGraph, TrailVertex};
pub use segment::TrailSegment;
pub use trail::{Trail, TrailGeometry};
