//! Geometry normalization: duplicate and contained trail removal.
//!
//! Runs before any topology work so that near-identical centerlines (the
//! same trail digitized twice, or a fragment re-exported inside a longer
//! line) never reach the intersection resolver as fake parallel geometry.

use geo::{Distance, Haversine, Point};
use log::{info, warn};
use rayon::prelude::*;
use rstar::RTreeObject;
use serde::{Deserialize, Serialize};

use crate::TrailId;
use crate::config::NetworkConfig;
use crate::geometry::{
    build_segment_index, coords_close, distance_to_line_m, meters_to_degrees,
};
use crate::model::Trail;

/// Audit log entry for one removed trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovalRecord {
    pub kept: TrailId,
    pub removed: TrailId,
    pub overlap_ratio: f64,
}

#[derive(Debug, Clone, Copy)]
struct PairDecision {
    keep: TrailId,
    drop: TrailId,
    overlap_ratio: f64,
}

/// Removes redundant trails and returns the survivors plus a removal log.
///
/// The pairwise scan is read-only and runs in parallel; decisions are then
/// sorted by id pair and applied sequentially so the surviving set never
/// depends on scan order.
pub fn normalize_trails(
    trails: Vec<Trail>,
    config: &NetworkConfig,
) -> (Vec<Trail>, Vec<RemovalRecord>) {
    if trails.len() < 2 {
        return (trails, Vec::new());
    }

    let lines: Vec<_> = trails.iter().map(|t| t.geometry.line.clone()).collect();
    let index = build_segment_index(&lines, config.duplicate_proximity_m);

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

    let mut decisions: Vec<PairDecision> = candidate_pairs
        .par_iter()
        .filter_map(|&(i, j)| classify_pair(&trails[i], &trails[j], config))
        .collect();
    decisions.sort_by_key(|d| (d.keep, d.drop));

    let mut removed: Vec<bool> = vec![false; trails.len()];
    let id_to_pos: hashbrown::HashMap<TrailId, usize> =
        trails.iter().enumerate().map(|(pos, t)| (t.id, pos)).collect();
    let mut log = Vec::new();

    for decision in decisions {
        let keep_pos = id_to_pos[&decision.keep];
        let drop_pos = id_to_pos[&decision.drop];
        // A trail removed earlier cannot justify further removals, and a
        // trail is only removed once.
        if removed[keep_pos] || removed[drop_pos] {
            continue;
        }
        removed[drop_pos] = true;
        info!(
            "Removing trail {} as duplicate of {} (overlap ratio {:.2})",
            decision.drop, decision.keep, decision.overlap_ratio
        );
        log.push(RemovalRecord {
            kept: decision.keep,
            removed: decision.drop,
            overlap_ratio: decision.overlap_ratio,
        });
    }

    let survivors = trails
        .into_iter()
        .enumerate()
        .filter_map(|(pos, t)| (!removed[pos]).then_some(t))
        .collect();
    (survivors, log)
}

fn classify_pair(a: &Trail, b: &Trail, config: &NetworkConfig) -> Option<PairDecision> {
    if a.length <= 0.0 || b.length <= 0.0 {
        warn!(
            "Skipping overlap check for degenerate geometry (trails {} and {})",
            a.id, b.id
        );
        return None;
    }

    // The shorter trail is the removal candidate throughout; equal lengths
    // fall back to keeping the smaller id.
    let (long, short) = if (a.length, b.id) >= (b.length, a.id) {
        (a, b)
    } else {
        (b, a)
    };

    let epsilon_deg = meters_to_degrees(config.exact_match_epsilon_m);
    if geometries_equal(long, short, epsilon_deg) || contains(long, short, config) {
        return Some(PairDecision {
            keep: long.id,
            drop: short.id,
            overlap_ratio: 1.0,
        });
    }

    let overlap_m = shared_alignment_length(short, long, config.duplicate_proximity_m);
    let ratio = overlap_m / short.length;
    if ratio >= config.overlap_ratio_threshold && overlap_m > config.overlap_length_floor_m {
        return Some(PairDecision {
            keep: long.id,
            drop: short.id,
            overlap_ratio: ratio,
        });
    }
    None
}

/// Exact geometric equality under the coordinate epsilon, in either
/// direction of travel.
fn geometries_equal(a: &Trail, b: &Trail, epsilon_deg: f64) -> bool {
    let ca = &a.geometry.line.0;
    let cb = &b.geometry.line.0;
    if ca.len() != cb.len() {
        return false;
    }
    let forward = ca
        .iter()
        .zip(cb.iter())
        .all(|(&x, &y)| coords_close(x, y, epsilon_deg));
    let backward = ca
        .iter()
        .zip(cb.iter().rev())
        .all(|(&x, &y)| coords_close(x, y, epsilon_deg));
    forward || backward
}

/// True when every vertex of `short` lies on `long`'s centerline within the
/// exact-match epsilon.
fn contains(long: &Trail, short: &Trail, config: &NetworkConfig) -> bool {
    short.geometry.line.0.iter().all(|&c| {
        distance_to_line_m(Point::from(c), &long.geometry.line)
            .is_some_and(|(d, _)| d <= config.exact_match_epsilon_m)
    })
}

/// Length of `short`'s runs whose consecutive vertices both project within
/// `proximity_m` of `other` — the shared-alignment portion of the pair.
fn shared_alignment_length(short: &Trail, other: &Trail, proximity_m: f64) -> f64 {
    let coords = &short.geometry.line.0;
    let mut on_line: Vec<bool> = Vec::with_capacity(coords.len());
    for &c in coords {
        let close = distance_to_line_m(Point::from(c), &other.geometry.line)
            .is_some_and(|(d, _)| d <= proximity_m);
        on_line.push(close);
    }

    let mut total = 0.0;
    for (i, pair) in coords.windows(2).enumerate() {
        if on_line[i] && on_line[i + 1] {
            total += Haversine.distance(Point::from(pair[0]), Point::from(pair[1]));
        }
    }
    total
}
