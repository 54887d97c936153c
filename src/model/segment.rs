//! Trail segments: the unit of work between splitting and topology building.

use crate::model::{Trail, TrailGeometry};
use crate::{SegmentId, TrailId};

/// A piece of a trail after zero or more splits.
///
/// Derived length and elevation fields are recomputed whenever the geometry
/// changes, so sums over a segment set stay conserved through splitting.
#[derive(Debug, Clone)]
pub struct TrailSegment {
    pub id: SegmentId,
    pub trail_id: TrailId,
    pub trail_name: String,
    pub geometry: TrailGeometry,
    pub length: f64,
    pub elevation_gain: f64,
    pub elevation_loss: f64,
    pub is_split: bool,
}

impl TrailSegment {
    pub fn new(
        id: SegmentId,
        trail_id: TrailId,
        trail_name: impl Into<String>,
        geometry: TrailGeometry,
        is_split: bool,
    ) -> Self {
        let length = geometry.length_m();
        let elevation_gain = geometry.elevation_gain();
        let elevation_loss = geometry.elevation_loss();
        Self {
            id,
            trail_id,
            trail_name: trail_name.into(),
            geometry,
            length,
            elevation_gain,
            elevation_loss,
            is_split,
        }
    }

    /// The initial 1:1 segment covering a whole trail.
    pub fn from_trail(id: SegmentId, trail: &Trail) -> Self {
        Self::new(id, trail.id, trail.name.clone(), trail.geometry.clone(), false)
    }

    /// Recomputes derived fields after a geometry change (endpoint snap).
    pub fn refresh_derived(&mut self) {
        self.length = self.geometry.length_m();
        self.elevation_gain = self.geometry.elevation_gain();
        self.elevation_loss = self.geometry.elevation_loss();
    }
}
