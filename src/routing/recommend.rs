//! Pattern matching, scoring, and ranking of candidate routes.

use hashbrown::HashSet;
use itertools::Itertools;
use log::{debug, info, warn};
use petgraph::stable_graph::{EdgeIndex, NodeIndex};
use serde::{Deserialize, Serialize};

use super::circuits::circuits_through;
use super::ksp::k_shortest_paths;
use crate::config::RouteSearchConfig;
use crate::model::TrailGraph;
use crate::pipeline::TrailNetwork;
use crate::{EdgeId, Error};

/// Elevation-gain-rate floor (meters of gain per meter of distance) used to
/// keep the rate error finite for flat targets.
const MIN_GAIN_RATE: f64 = 0.01;

/// The overall shape a recommended route must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteShape {
    /// Starts and ends at the same vertex without repeating an edge.
    Loop,
    /// Follows a path outward and retraces it back.
    OutAndBack,
    /// Starts and ends at different vertices.
    PointToPoint,
}

/// What the caller is asking for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePattern {
    pub target_distance_m: f64,
    pub target_elevation_gain_m: f64,
    pub shape: RouteShape,
    /// Accepted relative deviation from the target distance, in (0, 1).
    pub tolerance: f64,
}

impl RoutePattern {
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] for a non-positive target distance,
    /// a negative elevation target, or a tolerance outside (0, 1).
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.target_distance_m > 0.0) {
            return Err(Error::InvalidPattern(format!(
                "target_distance_m must be positive, got {}",
                self.target_distance_m
            )));
        }
        if self.target_elevation_gain_m < 0.0 {
            return Err(Error::InvalidPattern(format!(
                "target_elevation_gain_m must not be negative, got {}",
                self.target_elevation_gain_m
            )));
        }
        if !(self.tolerance > 0.0 && self.tolerance < 1.0) {
            return Err(Error::InvalidPattern(format!(
                "tolerance must be in (0, 1), got {}",
                self.tolerance
            )));
        }
        Ok(())
    }

    fn distance_window(&self) -> (f64, f64) {
        (
            self.target_distance_m * (1.0 - self.tolerance),
            self.target_distance_m * (1.0 + self.tolerance),
        )
    }
}

/// One ranked route. Edges are listed in traversal order; an out-and-back
/// lists the outbound edges followed by the same edges reversed.
#[derive(Debug, Clone, Serialize)]
pub struct RouteRecommendation {
    pub edges: Vec<EdgeId>,
    pub total_distance_m: f64,
    pub total_elevation_gain_m: f64,
    pub total_elevation_loss_m: f64,
    pub shape: RouteShape,
    /// Match quality in [0, 1], higher is better.
    pub score: f64,
    pub trail_names: Vec<String>,
}

struct Candidate {
    edge_ids: Vec<EdgeId>,
    unique_edges: HashSet<EdgeIndex>,
    unique_length: f64,
    distance: f64,
    gain: f64,
    loss: f64,
    score: f64,
}

/// Recommends routes for each pattern, in the pattern order given. A pattern
/// no route can satisfy yields an empty list, never an error.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] or [`Error::InvalidPattern`] when the
/// inputs themselves are malformed.
pub fn recommend_routes(
    network: &TrailNetwork,
    patterns: &[RoutePattern],
    config: &RouteSearchConfig,
) -> Result<Vec<Vec<RouteRecommendation>>, Error> {
    config.validate()?;
    for pattern in patterns {
        pattern.validate()?;
    }

    let graph = &network.graph;
    let endpoints = candidate_endpoints(graph, config.max_candidate_endpoints);
    info!(
        "Recommending routes for {} patterns over {} candidate endpoints",
        patterns.len(),
        endpoints.len()
    );

    let mut results = Vec::with_capacity(patterns.len());
    for pattern in patterns {
        let candidates = match pattern.shape {
            RouteShape::Loop => loop_candidates(graph, &endpoints, pattern, config),
            RouteShape::OutAndBack => out_and_back_candidates(graph, &endpoints, pattern, config),
            RouteShape::PointToPoint => {
                point_to_point_candidates(graph, &endpoints, pattern, config)
            }
        };
        let ranked = rank(candidates, graph, pattern, config);
        if ranked.is_empty() {
            warn!(
                "No {:?} route within {:.0}% of {:.0} m exists in this network",
                pattern.shape,
                pattern.tolerance * 100.0,
                pattern.target_distance_m
            );
        }
        results.push(ranked);
    }
    Ok(results)
}

/// Highest-degree vertices first; ties break toward the lower index so the
/// selection is stable run to run.
fn candidate_endpoints(graph: &TrailGraph, limit: usize) -> Vec<NodeIndex> {
    graph
        .graph
        .node_indices()
        .sorted_by_key(|&n| (std::cmp::Reverse(graph.degree(n)), n))
        .take(limit)
        .collect()
}

fn loop_candidates(
    graph: &TrailGraph,
    endpoints: &[NodeIndex],
    pattern: &RoutePattern,
    config: &RouteSearchConfig,
) -> Vec<Candidate> {
    let (lower, upper) = pattern.distance_window();
    let mut budget = config.circuit_row_budget;
    let mut seen: HashSet<Vec<EdgeIndex>> = HashSet::new();
    let mut candidates = Vec::new();

    for &root in endpoints {
        for circuit in circuits_through(graph, root, upper, &mut budget) {
            if circuit.cost < lower {
                continue;
            }
            // The same circuit is reachable from every candidate root on it.
            let signature: Vec<_> = circuit.edges.iter().copied().sorted().collect();
            if !seen.insert(signature) {
                continue;
            }
            candidates.push(make_candidate(
                graph,
                &circuit.nodes,
                &circuit.edges,
                false,
                pattern,
                config,
            ));
        }
        if budget == 0 {
            debug!("Circuit budget exhausted after root {root:?}");
            break;
        }
    }
    candidates
}

fn out_and_back_candidates(
    graph: &TrailGraph,
    endpoints: &[NodeIndex],
    pattern: &RoutePattern,
    config: &RouteSearchConfig,
) -> Vec<Candidate> {
    let (lower, upper) = pattern.distance_window();
    let mut candidates = Vec::new();

    for (i, &a) in endpoints.iter().enumerate() {
        for &b in &endpoints[i + 1..] {
            for path in
                k_shortest_paths(graph, a, b, config.k_shortest_paths, Some(upper / 2.0))
            {
                if path.cost * 2.0 < lower {
                    continue;
                }
                candidates.push(make_candidate(
                    graph,
                    &path.nodes,
                    &path.edges,
                    true,
                    pattern,
                    config,
                ));
            }
        }
    }
    candidates
}

fn point_to_point_candidates(
    graph: &TrailGraph,
    endpoints: &[NodeIndex],
    pattern: &RoutePattern,
    config: &RouteSearchConfig,
) -> Vec<Candidate> {
    let (lower, upper) = pattern.distance_window();
    let mut candidates = Vec::new();

    // Ordered pairs: a reversed path trades gain for loss, which can match
    // the elevation target differently.
    for &a in endpoints {
        for &b in endpoints {
            if a == b {
                continue;
            }
            for path in k_shortest_paths(graph, a, b, config.k_shortest_paths, Some(upper)) {
                if path.cost < lower {
                    continue;
                }
                candidates.push(make_candidate(
                    graph,
                    &path.nodes,
                    &path.edges,
                    false,
                    pattern,
                    config,
                ));
            }
        }
    }
    candidates
}

fn make_candidate(
    graph: &TrailGraph,
    nodes: &[NodeIndex],
    edges: &[EdgeIndex],
    doubled: bool,
    pattern: &RoutePattern,
    config: &RouteSearchConfig,
) -> Candidate {
    let (mut gain, mut loss) = directed_gain_loss(graph, nodes, edges);
    let one_way: f64 = edges.iter().map(|&e| graph.graph[e].length).sum();
    let mut distance = one_way;
    let mut edge_ids: Vec<EdgeId> = edges.iter().map(|&e| graph.graph[e].id).collect();
    if doubled {
        distance *= 2.0;
        // Coming back climbs what was descended on the way out.
        let total = gain + loss;
        gain = total;
        loss = total;
        edge_ids.extend(edges.iter().rev().map(|&e| graph.graph[e].id));
    }

    let unique_edges: HashSet<EdgeIndex> = edges.iter().copied().collect();
    let unique_length: f64 = unique_edges.iter().map(|&e| graph.graph[e].length).sum();
    let score = score(pattern, distance, gain, config);
    Candidate {
        edge_ids,
        unique_edges,
        unique_length,
        distance,
        gain,
        loss,
        score,
    }
}

/// Gain and loss along the traversal direction given by `nodes`.
fn directed_gain_loss(graph: &TrailGraph, nodes: &[NodeIndex], edges: &[EdgeIndex]) -> (f64, f64) {
    let mut gain = 0.0;
    let mut loss = 0.0;
    for (i, &edge) in edges.iter().enumerate() {
        let weight = &graph.graph[edge];
        let (source, target) = graph
            .graph
            .edge_endpoints(edge)
            .expect("edge in graph");
        let forward = source == target || source == nodes[i];
        if forward {
            gain += weight.elevation_gain;
            loss += weight.elevation_loss;
        } else {
            gain += weight.elevation_loss;
            loss += weight.elevation_gain;
        }
    }
    (gain, loss)
}

/// Weighted match quality: distance error relative to the target, elevation
/// error on gain rate so short and long routes compare fairly.
fn score(pattern: &RoutePattern, distance: f64, gain: f64, config: &RouteSearchConfig) -> f64 {
    let distance_error =
        ((distance - pattern.target_distance_m).abs() / pattern.target_distance_m).min(1.0);
    let target_rate = pattern.target_elevation_gain_m / pattern.target_distance_m;
    let rate = gain / distance;
    let elevation_error = ((rate - target_rate).abs() / target_rate.max(MIN_GAIN_RATE)).min(1.0);
    config.distance_weight * (1.0 - distance_error)
        + config.elevation_weight * (1.0 - elevation_error)
}

fn rank(
    mut candidates: Vec<Candidate>,
    graph: &TrailGraph,
    pattern: &RoutePattern,
    config: &RouteSearchConfig,
) -> Vec<RouteRecommendation> {
    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.edge_ids.cmp(&b.edge_ids))
    });

    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        let redundant = kept
            .iter()
            .any(|k| shared_ratio(graph, &candidate, k) > config.dedup_overlap_threshold);
        if !redundant {
            kept.push(candidate);
        }
        if kept.len() == config.max_routes_per_pattern {
            break;
        }
    }

    kept.into_iter()
        .map(|c| RouteRecommendation {
            trail_names: trail_names(graph, &c.unique_edges),
            edges: c.edge_ids,
            total_distance_m: c.distance,
            total_elevation_gain_m: c.gain,
            total_elevation_loss_m: c.loss,
            shape: pattern.shape,
            score: c.score,
        })
        .collect()
}

/// Length shared between two candidates, relative to the shorter one.
fn shared_ratio(graph: &TrailGraph, a: &Candidate, b: &Candidate) -> f64 {
    let shorter = a.unique_length.min(b.unique_length);
    if shorter <= 0.0 {
        return 1.0;
    }
    let shared: f64 = a
        .unique_edges
        .intersection(&b.unique_edges)
        .map(|&e| graph.graph[e].length)
        .sum();
    shared / shorter
}

fn trail_names(graph: &TrailGraph, edges: &HashSet<EdgeIndex>) -> Vec<String> {
    edges
        .iter()
        .flat_map(|&e| graph.graph[e].trail_names.iter().cloned())
        .sorted()
        .dedup()
        .collect()
}
