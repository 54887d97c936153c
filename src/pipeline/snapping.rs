//! Endpoint snapping: closing near-miss gaps left by independent
//! digitization of intersecting trails.
//!
//! Only segment endpoints ever move; interior vertices are untouched. The
//! decision phase reads an immutable snapshot of the segment set and the
//! moves are applied afterwards, so snapping is deterministic and
//! idempotent: an already-snapped endpoint is within the exact-match
//! epsilon of its target and is left alone on re-run.

use geo::{Coord, Distance, Haversine, Point};
use log::debug;
use rstar::RTree;

use crate::config::NetworkConfig;
use crate::geometry::{IndexedSegment, build_segment_index, distance_to_line_m, meters_to_degrees};
use crate::model::TrailSegment;

#[derive(Debug, Clone, Copy)]
struct SnapMove {
    segment_pos: usize,
    at_start: bool,
    target: Coord<f64>,
}

/// Snaps hovering endpoints onto nearby segments. Returns the adjusted set
/// and the number of endpoints that moved; a non-zero count means the
/// segments must go through intersection resolution again.
pub fn snap_endpoints(
    mut segments: Vec<TrailSegment>,
    config: &NetworkConfig,
) -> (Vec<TrailSegment>, usize) {
    if segments.is_empty() {
        return (segments, 0);
    }

    let lines: Vec<_> = segments.iter().map(|s| s.geometry.line.clone()).collect();
    let index = build_segment_index(&lines, config.snap_tolerance_m);

    let mut moves: Vec<SnapMove> = Vec::new();
    for (pos, segment) in segments.iter().enumerate() {
        for at_start in [true, false] {
            let endpoint = if at_start {
                segment.geometry.start()
            } else {
                segment.geometry.end()
            };
            if let Some(target) =
                snap_target(&segments, &index, pos, at_start, endpoint, config)
            {
                moves.push(SnapMove {
                    segment_pos: pos,
                    at_start,
                    target,
                });
            }
        }
    }

    for m in &moves {
        let segment = &mut segments[m.segment_pos];
        let n = segment.geometry.line.0.len();
        let slot = if m.at_start { 0 } else { n - 1 };
        debug!(
            "Snapping {} endpoint of segment {} onto ({:.7}, {:.7})",
            if m.at_start { "start" } else { "end" },
            segment.id,
            m.target.x,
            m.target.y
        );
        segment.geometry.line.0[slot] = m.target;
        segment.refresh_derived();
    }

    let moved = moves.len();
    (segments, moved)
}

/// Where this endpoint should move, if anywhere.
///
/// Preference order: another endpoint within the snap tolerance (including
/// the opposite end of the same segment, which closes loop trails), then a
/// projection onto another segment's interior. An endpoint already within
/// the exact-match epsilon of either target stays put. When a nearby
/// endpoint exists but sorts later, this endpoint stays put too: the later
/// one snaps here, so a facing pair joins instead of trading places.
fn snap_target(
    segments: &[TrailSegment],
    index: &RTree<IndexedSegment>,
    pos: usize,
    at_start: bool,
    endpoint: Coord<f64>,
    config: &NetworkConfig,
) -> Option<Coord<f64>> {
    let radius_deg = meters_to_degrees(config.snap_tolerance_m);
    let point = Point::from(endpoint);

    // Keyed on (distance, segment id, end flag) so exact ties resolve the
    // same way regardless of index iteration order.
    let mut best_endpoint: Option<((f64, u64, bool), usize, bool)> = None;
    let mut best_interior: Option<((f64, u64), Point<f64>)> = None;
    let mut endpoint_nearby = false;

    for candidate in
        index.locate_within_distance([endpoint.x, endpoint.y], radius_deg * radius_deg)
    {
        let other = &segments[candidate.pos];

        // Endpoint-to-endpoint candidates, including closing this segment's
        // own loop against its opposite end.
        for other_start in [true, false] {
            if candidate.pos == pos && other_start == at_start {
                continue;
            }
            let other_coord = if other_start {
                other.geometry.start()
            } else {
                other.geometry.end()
            };
            let d = Haversine.distance(point, Point::from(other_coord));
            if d <= config.exact_match_epsilon_m {
                return None; // already a shared junction
            }
            if d <= config.snap_tolerance_m {
                endpoint_nearby = true;
                let rank = (d, other.id, other_start);
                let better = best_endpoint
                    .is_none_or(|(prev, ..)| (rank.0, rank.1, rank.2) < (prev.0, prev.1, prev.2));
                // Deterministic tie direction: only the later endpoint moves.
                let yields = (other.id, other_start) < (segments[pos].id, at_start);
                if better && yields {
                    best_endpoint = Some((rank, candidate.pos, other_start));
                }
            }
        }

        if candidate.pos == pos {
            continue;
        }
        if let Some((d, projected)) = distance_to_line_m(point, &other.geometry.line) {
            if d <= config.exact_match_epsilon_m {
                return None; // already on the line
            }
            let rank = (d, other.id);
            if d <= config.snap_tolerance_m
                && best_interior.is_none_or(|(prev, _)| rank < prev)
            {
                best_interior = Some((rank, projected));
            }
        }
    }

    if let Some((_, other_pos, other_start)) = best_endpoint {
        let other = &segments[other_pos].geometry;
        let target = if other_start { other.start() } else { other.end() };
        return Some(target);
    }
    if endpoint_nearby {
        // A later-sorting endpoint is in range; it moves here instead.
        return None;
    }
    best_interior.map(|(_, projected)| projected.into())
}
