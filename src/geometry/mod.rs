//! Shared planar/geodesic geometry helpers and the segment spatial index.
//!
//! Pairwise scans never compare every segment against every other; segments
//! are bulk-loaded into an R-tree keyed on their bounding envelopes and only
//! envelope-overlapping pairs are inspected.

use geo::{
    BoundingRect, Closest, ClosestPoint, Coord, Distance, Haversine, LineString, Point, Rect,
};
use rstar::{AABB, PointDistance, RTree, RTreeObject};

use crate::METERS_PER_DEGREE;
use crate::model::TrailGeometry;

/// Converts a metric tolerance to an approximate degree radius for
/// coordinate-space index queries. Always refine hits with [`Haversine`].
pub(crate) fn meters_to_degrees(m: f64) -> f64 {
    m / METERS_PER_DEGREE
}

/// A segment registered in the spatial index; `pos` indexes the segment
/// slice the R-tree was built from. Envelopes are padded so that degenerate
/// (axis-aligned) lines still report overlap with neighbors inside the
/// working tolerance.
pub(crate) struct IndexedSegment {
    pub pos: usize,
    pub line: LineString<f64>,
    bbox: Rect<f64>,
    pad_deg: f64,
}

impl IndexedSegment {
    pub fn new(pos: usize, line: LineString<f64>, pad_deg: f64) -> Option<Self> {
        let bbox = line.bounding_rect()?;
        Some(Self {
            pos,
            line,
            bbox,
            pad_deg,
        })
    }
}

impl RTreeObject for IndexedSegment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bbox.min().x - self.pad_deg, self.bbox.min().y - self.pad_deg],
            [self.bbox.max().x + self.pad_deg, self.bbox.max().y + self.pad_deg],
        )
    }
}

impl PointDistance for IndexedSegment {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let c = Coord {
            x: point[0],
            y: point[1],
        };
        self.line
            .lines()
            .map(|l| planar_segment_distance_sq(c, l.start, l.end))
            .fold(f64::INFINITY, f64::min)
    }
}

/// Builds the index over all segments with valid bounding boxes, padding
/// envelopes by `pad_m` meters.
pub(crate) fn build_segment_index(lines: &[LineString<f64>], pad_m: f64) -> RTree<IndexedSegment> {
    let pad_deg = meters_to_degrees(pad_m);
    let indexed: Vec<IndexedSegment> = lines
        .iter()
        .enumerate()
        .filter_map(|(pos, line)| IndexedSegment::new(pos, line.clone(), pad_deg))
        .collect();
    RTree::bulk_load(indexed)
}

/// Squared planar (degree-space) distance from a point to a segment.
/// Only used for index-side pruning; metric answers come from [`Haversine`].
fn planar_segment_distance_sq(p: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    let ab = Coord {
        x: b.x - a.x,
        y: b.y - a.y,
    };
    let len_sq = ab.x * ab.x + ab.y * ab.y;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((p.x - a.x) * ab.x + (p.y - a.y) * ab.y) / len_sq).clamp(0.0, 1.0)
    };
    let proj = Coord {
        x: a.x + t * ab.x,
        y: a.y + t * ab.y,
    };
    let d = Coord {
        x: p.x - proj.x,
        y: p.y - proj.y,
    };
    d.x * d.x + d.y * d.y
}

/// Geodesic distance from a point to a line string, with the closest point.
/// `None` for degenerate geometry where no closest point is defined.
pub(crate) fn distance_to_line_m(
    point: Point<f64>,
    line: &LineString<f64>,
) -> Option<(f64, Point<f64>)> {
    match line.closest_point(&point) {
        Closest::Intersection(p) | Closest::SinglePoint(p) => {
            Some((Haversine.distance(point, p), p))
        }
        Closest::Indeterminate => None,
    }
}

/// True when two coordinates are within `epsilon_deg` on both axes.
pub(crate) fn coords_close(a: Coord<f64>, b: Coord<f64>, epsilon_deg: f64) -> bool {
    (a.x - b.x).abs() <= epsilon_deg && (a.y - b.y).abs() <= epsilon_deg
}

/// A point located along a trail geometry, used as a cut position.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LocatedPoint {
    /// Index of the constituent line the point falls on.
    pub segment_index: usize,
    /// Fraction along that constituent line, in [0, 1].
    pub fraction: f64,
    /// Geodesic distance from the line start, meters.
    pub distance_along_m: f64,
    pub coord: Coord<f64>,
    pub elevation: f64,
}

/// Projects a coordinate onto a trail geometry, returning its position along
/// the line with interpolated elevation. `None` for degenerate geometry.
pub(crate) fn locate_on_geometry(geometry: &TrailGeometry, c: Coord<f64>) -> Option<LocatedPoint> {
    let coords = &geometry.line.0;
    if coords.len() < 2 {
        return None;
    }

    let mut best: Option<(usize, f64, f64)> = None;
    for (i, pair) in coords.windows(2).enumerate() {
        let (a, b) = (pair[0], pair[1]);
        let ab = Coord {
            x: b.x - a.x,
            y: b.y - a.y,
        };
        let len_sq = ab.x * ab.x + ab.y * ab.y;
        let t = if len_sq == 0.0 {
            0.0
        } else {
            (((c.x - a.x) * ab.x + (c.y - a.y) * ab.y) / len_sq).clamp(0.0, 1.0)
        };
        let d_sq = planar_segment_distance_sq(c, a, b);
        if best.is_none_or(|(_, _, prev)| d_sq < prev) {
            best = Some((i, t, d_sq));
        }
    }
    let (segment_index, fraction, _) = best?;

    let a = coords[segment_index];
    let b = coords[segment_index + 1];
    let coord = Coord {
        x: a.x + fraction * (b.x - a.x),
        y: a.y + fraction * (b.y - a.y),
    };
    let elevation = geometry.elevations[segment_index]
        + fraction * (geometry.elevations[segment_index + 1] - geometry.elevations[segment_index]);

    let mut distance_along_m = 0.0;
    for pair in coords.windows(2).take(segment_index) {
        distance_along_m += Haversine.distance(Point::from(pair[0]), Point::from(pair[1]));
    }
    distance_along_m += Haversine.distance(Point::from(a), Point::from(coord));

    Some(LocatedPoint {
        segment_index,
        fraction,
        distance_along_m,
        coord,
        elevation,
    })
}

/// Splits a geometry at the given located points, in one pass.
///
/// Cuts are sorted along the line first. A cut that would leave a piece
/// shorter than `min_piece_length_m` on either side is skipped, so the
/// sliver is absorbed into its neighbor instead of surviving or being
/// dropped. Returns the pieces in order; a single element means no cut
/// was applied.
pub(crate) fn split_geometry(
    geometry: &TrailGeometry,
    cuts: &[LocatedPoint],
    min_piece_length_m: f64,
    epsilon_deg: f64,
) -> Vec<TrailGeometry> {
    let total = geometry.length_m();
    let mut ordered: Vec<LocatedPoint> = cuts.to_vec();
    ordered.sort_by(|a, b| a.distance_along_m.total_cmp(&b.distance_along_m));

    // Drop cuts that would create slivers against the ends, a neighbor cut,
    // or a previously accepted cut.
    let mut accepted: Vec<LocatedPoint> = Vec::with_capacity(ordered.len());
    for cut in ordered {
        let prev_boundary = accepted
            .last()
            .map_or(0.0, |c: &LocatedPoint| c.distance_along_m);
        if cut.distance_along_m - prev_boundary < min_piece_length_m {
            continue;
        }
        if total - cut.distance_along_m < min_piece_length_m {
            continue;
        }
        accepted.push(cut);
    }
    if accepted.is_empty() {
        return vec![geometry.clone()];
    }

    let coords = &geometry.line.0;
    let elevations = &geometry.elevations;
    let mut pieces = Vec::with_capacity(accepted.len() + 1);
    let mut current: Vec<(Coord<f64>, f64)> = vec![(coords[0], elevations[0])];
    let mut last_vertex = 0usize;

    for cut in &accepted {
        for i in (last_vertex + 1)..=cut.segment_index {
            push_unless_duplicate(&mut current, coords[i], elevations[i], epsilon_deg);
        }
        last_vertex = cut.segment_index;
        push_unless_duplicate(&mut current, cut.coord, cut.elevation, epsilon_deg);
        if current.len() >= 2 {
            pieces.push(piece_geometry(&current));
        }
        current = vec![(cut.coord, cut.elevation)];
    }
    for i in (last_vertex + 1)..coords.len() {
        push_unless_duplicate(&mut current, coords[i], elevations[i], epsilon_deg);
    }
    if current.len() >= 2 {
        pieces.push(piece_geometry(&current));
    }

    if pieces.is_empty() {
        vec![geometry.clone()]
    } else {
        pieces
    }
}

fn push_unless_duplicate(
    acc: &mut Vec<(Coord<f64>, f64)>,
    c: Coord<f64>,
    z: f64,
    epsilon_deg: f64,
) {
    if let Some(&(last, _)) = acc.last() {
        if coords_close(last, c, epsilon_deg) {
            return;
        }
    }
    acc.push((c, z));
}

fn piece_geometry(points: &[(Coord<f64>, f64)]) -> TrailGeometry {
    let line = LineString::from(points.iter().map(|&(c, _)| c).collect::<Vec<_>>());
    let elevations = points.iter().map(|&(_, z)| z).collect();
    TrailGeometry { line, elevations }
}
