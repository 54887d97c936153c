//! Iterative intersection resolution: classify every crossing pair and split
//! both participants until a full pass produces no further change.
//!
//! The scan phase is read-only and parallel; the split phase is applied
//! sequentially in segment-id order so the resulting topology never depends
//! on scan scheduling. The loop carries an explicit iteration bound and
//! reports non-convergence as a warning, keeping the last stable state.

use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use geo::{Coord, Point};
use hashbrown::HashMap;
use log::{debug, warn};
use rayon::prelude::*;
use rstar::RTreeObject;

use crate::SegmentId;
use crate::config::NetworkConfig;
use crate::geometry::{
    build_segment_index, coords_close, distance_to_line_m, locate_on_geometry, meters_to_degrees,
    split_geometry,
};
use crate::model::TrailSegment;
use crate::pipeline::SegmentIds;

/// How a pair of segments meets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntersectionKind {
    /// One intersection point sitting at an endpoint of exactly one of the
    /// two segments.
    TJunction,
    /// One or two points interior to both segments — a true crossing.
    Crossing,
    /// An endpoint within snap tolerance of the other segment's interior
    /// without touching it; resolved by the endpoint snapper, not by
    /// splitting.
    NearMiss,
    /// More than two intersection points or collinear overlap between the
    /// same pair.
    ParallelOverlap,
}

/// A classified meeting point between two segments, recorded for audit and
/// consumed by the split pass of the same iteration.
#[derive(Debug, Clone)]
pub struct RawIntersection {
    pub point: Coord<f64>,
    pub kind: IntersectionKind,
    pub segments: (SegmentId, SegmentId),
    /// The tolerance the classification was made under: the exact-match
    /// epsilon for geometric kinds, the snap tolerance for near misses.
    pub tolerance_m: f64,
}

/// Result of running the resolver to its fixpoint.
#[derive(Debug)]
pub struct ResolutionOutcome {
    pub segments: Vec<TrailSegment>,
    pub intersections: Vec<RawIntersection>,
    pub converged: bool,
    pub iterations: usize,
    /// Pairs with parallel overlap that still could not be cleanly split
    /// after the final pass. Flagged, never dropped.
    pub unresolved_overlaps: Vec<(SegmentId, SegmentId)>,
}

struct PairScan {
    a: SegmentId,
    b: SegmentId,
    kind: IntersectionKind,
    /// Cut positions for splittable kinds; for a near miss, the hovering
    /// endpoint (never cut, closed by the snapper).
    points: Vec<Coord<f64>>,
    tolerance_m: f64,
}

/// Splits segments at classified intersections until a pass applies no cut
/// or the iteration bound is reached.
pub fn resolve_intersections(
    mut segments: Vec<TrailSegment>,
    ids: &mut SegmentIds,
    config: &NetworkConfig,
) -> ResolutionOutcome {
    let mut all_intersections = Vec::new();
    let mut iterations = 0;
    let mut converged = false;
    let mut overlap_pairs: Vec<(SegmentId, SegmentId)> = Vec::new();

    while iterations < config.max_fixpoint_iterations {
        iterations += 1;
        let scans = scan_pairs(&segments, config);
        overlap_pairs = scans
            .iter()
            .filter(|s| s.kind == IntersectionKind::ParallelOverlap)
            .map(|s| (s.a, s.b))
            .collect();

        let (next, cuts_applied) = apply_splits(segments, &scans, ids, config);
        segments = next;

        for scan in &scans {
            for &point in &scan.points {
                all_intersections.push(RawIntersection {
                    point,
                    kind: scan.kind,
                    segments: (scan.a, scan.b),
                    tolerance_m: scan.tolerance_m,
                });
            }
        }

        debug!(
            "Intersection pass {iterations}: {} pairs, {cuts_applied} cuts applied",
            scans.len()
        );
        if cuts_applied == 0 {
            converged = true;
            break;
        }
    }

    if !converged {
        warn!(
            "Intersection resolution did not converge within {} passes; \
             continuing with the last stable segment set",
            config.max_fixpoint_iterations
        );
    }
    for &(a, b) in &overlap_pairs {
        warn!("Parallel overlap between segments {a} and {b} left unsplit");
    }

    ResolutionOutcome {
        segments,
        intersections: all_intersections,
        converged,
        iterations,
        unresolved_overlaps: overlap_pairs,
    }
}

/// Read-only classification of every envelope-overlapping pair.
fn scan_pairs(segments: &[TrailSegment], config: &NetworkConfig) -> Vec<PairScan> {
    if segments.len() < 2 {
        return Vec::new();
    }
    let lines: Vec<_> = segments.iter().map(|s| s.geometry.line.clone()).collect();
    let index = build_segment_index(&lines, config.snap_tolerance_m);

    let mut candidate_pairs: Vec<(usize, usize)> = Vec::new();
    for entry in index.iter() {
        for other in index.locate_in_envelope_intersecting(&entry.envelope()) {
            if entry.pos < other.pos {
                candidate_pairs.push((entry.pos, other.pos));
            }
        }
    }
    candidate_pairs.sort_unstable();
    candidate_pairs.dedup();

    let mut scans: Vec<PairScan> = candidate_pairs
        .par_iter()
        .filter_map(|&(i, j)| classify_pair(&segments[i], &segments[j], config))
        .collect();
    scans.sort_by_key(|s| (s.a, s.b));
    scans
}

fn classify_pair(
    a: &TrailSegment,
    b: &TrailSegment,
    config: &NetworkConfig,
) -> Option<PairScan> {
    let epsilon_deg = meters_to_degrees(config.exact_match_epsilon_m);
    let mut points: Vec<Coord<f64>> = Vec::new();
    let mut collinear = false;

    for la in a.geometry.line.lines() {
        for lb in b.geometry.line.lines() {
            match line_intersection(la, lb) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    push_distinct(&mut points, intersection, epsilon_deg);
                }
                Some(LineIntersection::Collinear { intersection }) => {
                    collinear = true;
                    push_distinct(&mut points, intersection.start, epsilon_deg);
                    push_distinct(&mut points, intersection.end, epsilon_deg);
                }
                None => {}
            }
        }
    }

    // Points that are endpoints of both segments are junctions that already
    // exist in the topology; they are not new intersections.
    points.retain(|&p| {
        !(is_segment_endpoint(a, p, epsilon_deg) && is_segment_endpoint(b, p, epsilon_deg))
    });

    if collinear || points.len() > 2 {
        return Some(PairScan {
            a: a.id,
            b: b.id,
            kind: IntersectionKind::ParallelOverlap,
            points,
            tolerance_m: config.exact_match_epsilon_m,
        });
    }
    match points.len() {
        0 => near_miss(a, b, config).map(|hovering| PairScan {
            a: a.id,
            b: b.id,
            kind: IntersectionKind::NearMiss,
            points: vec![hovering],
            tolerance_m: config.snap_tolerance_m,
        }),
        1 => {
            let p = points[0];
            let at_a = is_segment_endpoint(a, p, epsilon_deg);
            let at_b = is_segment_endpoint(b, p, epsilon_deg);
            let kind = if at_a != at_b {
                IntersectionKind::TJunction
            } else {
                IntersectionKind::Crossing
            };
            Some(PairScan {
                a: a.id,
                b: b.id,
                kind,
                points,
                tolerance_m: config.exact_match_epsilon_m,
            })
        }
        _ => Some(PairScan {
            a: a.id,
            b: b.id,
            kind: IntersectionKind::Crossing,
            points,
            tolerance_m: config.exact_match_epsilon_m,
        }),
    }
}

fn push_distinct(points: &mut Vec<Coord<f64>>, p: Coord<f64>, epsilon_deg: f64) {
    if !points.iter().any(|&q| coords_close(p, q, epsilon_deg)) {
        points.push(p);
    }
}

fn is_segment_endpoint(segment: &TrailSegment, p: Coord<f64>, epsilon_deg: f64) -> bool {
    coords_close(segment.geometry.start(), p, epsilon_deg)
        || coords_close(segment.geometry.end(), p, epsilon_deg)
}

/// An endpoint of one segment hovering near the other's line without
/// touching it. Returns the hovering endpoint; the endpoint snapper closes
/// these gaps, the resolver only classifies them.
fn near_miss(a: &TrailSegment, b: &TrailSegment, config: &NetworkConfig) -> Option<Coord<f64>> {
    let hovering = |endpoint: Coord<f64>, other: &TrailSegment| {
        distance_to_line_m(Point::from(endpoint), &other.geometry.line).is_some_and(|(d, _)| {
            d > config.exact_match_epsilon_m && d <= config.snap_tolerance_m
        })
    };
    [
        (a.geometry.start(), b),
        (a.geometry.end(), b),
        (b.geometry.start(), a),
        (b.geometry.end(), a),
    ]
    .into_iter()
    .find(|&(endpoint, other)| hovering(endpoint, other))
    .map(|(endpoint, _)| endpoint)
}

/// Sequential split application in segment-id order. Returns the new segment
/// set and the number of cuts that actually took effect.
fn apply_splits(
    segments: Vec<TrailSegment>,
    scans: &[PairScan],
    ids: &mut SegmentIds,
    config: &NetworkConfig,
) -> (Vec<TrailSegment>, usize) {
    let mut cuts_by_segment: HashMap<SegmentId, Vec<Coord<f64>>> = HashMap::new();
    for scan in scans {
        if scan.kind == IntersectionKind::NearMiss {
            continue;
        }
        for &p in &scan.points {
            cuts_by_segment.entry(scan.a).or_default().push(p);
            cuts_by_segment.entry(scan.b).or_default().push(p);
        }
    }
    if cuts_by_segment.is_empty() {
        return (segments, 0);
    }

    let epsilon_deg = meters_to_degrees(config.exact_match_epsilon_m);
    let mut next = Vec::with_capacity(segments.len());
    let mut cuts_applied = 0usize;

    for segment in segments {
        let Some(points) = cuts_by_segment.get(&segment.id) else {
            next.push(segment);
            continue;
        };

        let mut located: Vec<_> = points
            .iter()
            .filter_map(|&p| locate_on_geometry(&segment.geometry, p))
            .collect();
        // A cut point sitting on a segment endpoint splits nothing.
        located.retain(|l| {
            !coords_close(l.coord, segment.geometry.start(), epsilon_deg)
                && !coords_close(l.coord, segment.geometry.end(), epsilon_deg)
        });
        if located.is_empty() {
            next.push(segment);
            continue;
        }

        let pieces = split_geometry(
            &segment.geometry,
            &located,
            config.min_segment_length_m,
            epsilon_deg,
        );
        if pieces.len() <= 1 {
            next.push(segment);
            continue;
        }

        cuts_applied += pieces.len() - 1;
        for piece in pieces {
            next.push(TrailSegment::new(
                ids.next(),
                segment.trail_id,
                segment.trail_name.clone(),
                piece,
                true,
            ));
        }
    }

    (next, cuts_applied)
}

/// Seen-pair bookkeeping shared by tests; exposed so scenario tests can
/// assert on the classification alone.
#[cfg(test)]
pub(crate) fn classify_for_test(
    a: &TrailSegment,
    b: &TrailSegment,
    config: &NetworkConfig,
) -> Option<(IntersectionKind, usize)> {
    classify_pair(a, b, config).map(|s| (s.kind, s.points.len()))
}
