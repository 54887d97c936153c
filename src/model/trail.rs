//! Raw trail centerlines and their 3D geometry.

use geo::{Coord, Haversine, Length, LineString, Point};

use crate::{Error, TrailId};

/// A 3D centerline: a 2D line string plus one elevation value per vertex.
///
/// Planar algorithms run on `line`; elevation gain/loss and cut-point
/// interpolation use `elevations`, which always has one entry per coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct TrailGeometry {
    pub line: LineString<f64>,
    pub elevations: Vec<f64>,
}

impl TrailGeometry {
    /// # Errors
    ///
    /// Returns [`Error::InvalidData`] when the elevation vector does not
    /// match the coordinate count or the line has fewer than two points.
    pub fn new(line: LineString<f64>, elevations: Vec<f64>) -> Result<Self, Error> {
        if line.0.len() < 2 {
            return Err(Error::InvalidData(format!(
                "polyline needs at least 2 points, got {}",
                line.0.len()
            )));
        }
        if line.0.len() != elevations.len() {
            return Err(Error::InvalidData(format!(
                "elevation count {} does not match coordinate count {}",
                elevations.len(),
                line.0.len()
            )));
        }
        Ok(Self { line, elevations })
    }

    /// Builds a geometry from `(lon, lat, elevation)` triples.
    ///
    /// # Panics
    ///
    /// Panics when fewer than two points are given; intended for callers
    /// that construct geometry from literals (ingestion validates its own
    /// input before reaching this crate).
    pub fn from_coords(coords: &[(f64, f64, f64)]) -> Self {
        let line = LineString::from(
            coords
                .iter()
                .map(|&(x, y, _)| Coord { x, y })
                .collect::<Vec<_>>(),
        );
        let elevations = coords.iter().map(|&(_, _, z)| z).collect();
        Self::new(line, elevations).expect("literal coordinates")
    }

    /// Geodesic length of the centerline in meters.
    pub fn length_m(&self) -> f64 {
        Haversine.length(&self.line)
    }

    /// Sum of positive elevation deltas along the line, in meters.
    pub fn elevation_gain(&self) -> f64 {
        self.elevations
            .windows(2)
            .map(|w| (w[1] - w[0]).max(0.0))
            .sum()
    }

    /// Sum of negative elevation deltas along the line, as a positive number.
    pub fn elevation_loss(&self) -> f64 {
        self.elevations
            .windows(2)
            .map(|w| (w[0] - w[1]).max(0.0))
            .sum()
    }

    pub fn start(&self) -> Coord<f64> {
        self.line.0[0]
    }

    pub fn end(&self) -> Coord<f64> {
        self.line.0[self.line.0.len() - 1]
    }

    pub fn start_point(&self) -> Point<f64> {
        Point::from(self.start())
    }

    pub fn end_point(&self) -> Point<f64> {
        Point::from(self.end())
    }

    pub fn start_elevation(&self) -> f64 {
        self.elevations[0]
    }

    pub fn end_elevation(&self) -> f64 {
        self.elevations[self.elevations.len() - 1]
    }

    pub fn num_points(&self) -> usize {
        self.line.0.len()
    }

    /// Reverses the line in place, keeping elevations aligned.
    pub fn reverse(&mut self) {
        self.line.0.reverse();
        self.elevations.reverse();
    }
}

/// A raw named centerline as ingested. Immutable once created; the pipeline
/// only ever derives segments from it.
#[derive(Debug, Clone)]
pub struct Trail {
    pub id: TrailId,
    pub name: String,
    pub geometry: TrailGeometry,
    pub length: f64,
    pub elevation_gain: f64,
    pub elevation_loss: f64,
    pub source_tag: String,
}

impl Trail {
    pub fn new(
        id: TrailId,
        name: impl Into<String>,
        geometry: TrailGeometry,
        source_tag: impl Into<String>,
    ) -> Self {
        let length = geometry.length_m();
        let elevation_gain = geometry.elevation_gain();
        let elevation_loss = geometry.elevation_loss();
        Self {
            id,
            name: name.into(),
            geometry,
            length,
            elevation_gain,
            elevation_loss,
            source_tag: source_tag.into(),
        }
    }
}
