//! Named tolerances and search parameters for the pipeline and route engine.
//!
//! Every threshold that shapes the output topology is a named field with a
//! documented unit and default, so behavior stays reproducible and testable.
//! Configuration is validated up front; an invalid value is fatal while
//! per-pair geometry trouble downstream never is.

use serde::{Deserialize, Serialize};

use crate::Error;

/// Tolerances for the topology-building stages (normalization through
/// connectivity validation). All distances are meters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Maximum gap at which a near-miss endpoint is pulled onto a nearby
    /// trail (Y-junction closing).
    pub snap_tolerance_m: f64,
    /// Distance below which two points are treated as the same point.
    /// Controls vertex grouping and intersection dedup.
    pub exact_match_epsilon_m: f64,
    /// Minimum surviving segment length; a cut that would produce a shorter
    /// sliver is skipped so the sliver is absorbed by its neighbor.
    pub min_segment_length_m: f64,
    /// Upper bound on classify-and-split passes before the resolver gives up
    /// and keeps the last stable state.
    pub max_fixpoint_iterations: usize,
    /// Proximity within which two trails are considered to run on the same
    /// alignment when measuring overlap.
    pub duplicate_proximity_m: f64,
    /// Overlap ratio (shared length / shorter length) at or above which the
    /// shorter trail is removed as a redundant duplicate.
    pub overlap_ratio_threshold: f64,
    /// Absolute shared-length floor that must also be exceeded before a
    /// high overlap ratio triggers removal.
    pub overlap_length_floor_m: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            snap_tolerance_m: 5.0,
            exact_match_epsilon_m: 0.01,
            min_segment_length_m: 10.0,
            max_fixpoint_iterations: 10,
            duplicate_proximity_m: 10.0,
            overlap_ratio_threshold: 0.8,
            overlap_length_floor_m: 10.0,
        }
    }
}

impl NetworkConfig {
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when a tolerance is non-positive,
    /// out of range, or inconsistent with another.
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.snap_tolerance_m > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "snap_tolerance_m must be positive, got {}",
                self.snap_tolerance_m
            )));
        }
        if !(self.exact_match_epsilon_m > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "exact_match_epsilon_m must be positive, got {}",
                self.exact_match_epsilon_m
            )));
        }
        if self.exact_match_epsilon_m >= self.snap_tolerance_m {
            return Err(Error::InvalidConfig(format!(
                "exact_match_epsilon_m ({}) must be below snap_tolerance_m ({})",
                self.exact_match_epsilon_m, self.snap_tolerance_m
            )));
        }
        if !(self.min_segment_length_m > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "min_segment_length_m must be positive, got {}",
                self.min_segment_length_m
            )));
        }
        if self.max_fixpoint_iterations == 0 {
            return Err(Error::InvalidConfig(
                "max_fixpoint_iterations must be at least 1".to_string(),
            ));
        }
        if !(self.duplicate_proximity_m > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "duplicate_proximity_m must be positive, got {}",
                self.duplicate_proximity_m
            )));
        }
        if !(self.overlap_ratio_threshold > 0.0 && self.overlap_ratio_threshold <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "overlap_ratio_threshold must be in (0, 1], got {}",
                self.overlap_ratio_threshold
            )));
        }
        if self.overlap_length_floor_m < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "overlap_length_floor_m must not be negative, got {}",
                self.overlap_length_floor_m
            )));
        }
        Ok(())
    }
}

/// Parameters for the route recommendation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSearchConfig {
    /// Weight of the distance-match error in the candidate score.
    pub distance_weight: f64,
    /// Weight of the elevation-gain-rate-match error in the candidate score.
    /// `distance_weight + elevation_weight` must equal 1.0.
    pub elevation_weight: f64,
    /// Number of alternative paths requested per candidate endpoint pair.
    pub k_shortest_paths: usize,
    /// How many of the highest-degree vertices are tried as route endpoints
    /// for point-to-point and out-and-back patterns.
    pub max_candidate_endpoints: usize,
    /// Upper bound on enumerated simple circuits per loop pattern.
    pub circuit_row_budget: usize,
    /// Maximum recommendations returned per pattern.
    pub max_routes_per_pattern: usize,
    /// Shared edge length / shorter candidate length above which two
    /// candidates are considered the same route; the higher-scoring one wins.
    pub dedup_overlap_threshold: f64,
}

impl Default for RouteSearchConfig {
    fn default() -> Self {
        Self {
            distance_weight: 0.6,
            elevation_weight: 0.4,
            k_shortest_paths: 8,
            max_candidate_endpoints: 12,
            circuit_row_budget: 10_000,
            max_routes_per_pattern: 5,
            dedup_overlap_threshold: 0.6,
        }
    }
}

impl RouteSearchConfig {
    const WEIGHT_TOLERANCE: f64 = 1e-9;

    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when the scoring weights do not sum
    /// to 1.0 or a search bound is zero.
    pub fn validate(&self) -> Result<(), Error> {
        if self.distance_weight < 0.0 || self.elevation_weight < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "scoring weights must not be negative, got {} and {}",
                self.distance_weight, self.elevation_weight
            )));
        }
        let sum = self.distance_weight + self.elevation_weight;
        if (sum - 1.0).abs() > Self::WEIGHT_TOLERANCE {
            return Err(Error::InvalidConfig(format!(
                "scoring weights must sum to 1.0, got {sum}"
            )));
        }
        if self.k_shortest_paths == 0 {
            return Err(Error::InvalidConfig(
                "k_shortest_paths must be at least 1".to_string(),
            ));
        }
        if self.max_candidate_endpoints < 2 {
            return Err(Error::InvalidConfig(
                "max_candidate_endpoints must be at least 2".to_string(),
            ));
        }
        if self.max_routes_per_pattern == 0 {
            return Err(Error::InvalidConfig(
                "max_routes_per_pattern must be at least 1".to_string(),
            ));
        }
        if !(self.dedup_overlap_threshold > 0.0 && self.dedup_overlap_threshold <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "dedup_overlap_threshold must be in (0, 1], got {}",
                self.dedup_overlap_threshold
            )));
        }
        Ok(())
    }
}
