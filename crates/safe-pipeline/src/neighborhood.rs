//! Neighborhood construction from node-distance relationships.
//!
//! Builds the boolean node×node membership matrix that every downstream
//! stage consumes. Distances are truncated shortest paths: a Dijkstra search
//! from each source stops as soon as the frontier passes the radius, so the
//! per-source cost stays proportional to the neighborhood actually reached.

use ndarray::Array2;
use rayon::prelude::*;
use safe_core::{NeighborhoodConfig, Network, NodeDistanceMetric, RadiusType, Result, SafeError};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Node×node neighborhood membership matrix.
///
/// Entries are 0.0/1.0 so the matrix can be used directly in the matrix
/// products of the enrichment stage. Row i marks the members of node i's
/// neighborhood; the node itself is always a member.
#[derive(Debug, Clone)]
pub struct NeighborhoodMatrix {
    membership: Array2<f64>,
}

impl NeighborhoodMatrix {
    pub fn num_nodes(&self) -> usize {
        self.membership.nrows()
    }

    pub fn membership(&self) -> &Array2<f64> {
        &self.membership
    }

    pub fn contains(&self, node: usize, member: usize) -> bool {
        self.membership[[node, member]] != 0.0
    }

    /// Neighborhood size per node (row sums).
    pub fn sizes(&self) -> Vec<usize> {
        (0..self.num_nodes())
            .map(|i| self.membership.row(i).sum() as usize)
            .collect()
    }

    /// Mean and standard deviation of neighborhood sizes.
    pub fn size_stats(&self) -> (f64, f64) {
        let sizes = self.sizes();
        if sizes.is_empty() {
            return (0.0, 0.0);
        }
        let n = sizes.len() as f64;
        let mean = sizes.iter().sum::<usize>() as f64 / n;
        let variance = sizes
            .iter()
            .map(|&s| (s as f64 - mean).powi(2))
            .sum::<f64>()
            / n;
        (mean, variance.sqrt())
    }
}

/// Heap entry for the truncated Dijkstra search (min-heap on distance).
#[derive(Clone, Copy)]
struct Visit {
    distance: f64,
    node: usize,
}

impl PartialEq for Visit {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
    }
}
impl Eq for Visit {}

impl PartialOrd for Visit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        // Reverse for min-heap
        other.distance.partial_cmp(&self.distance)
    }
}
impl Ord for Visit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other).unwrap_or(Ordering::Equal)
    }
}

/// Builds a [`NeighborhoodMatrix`] for a network.
pub struct NeighborhoodBuilder {
    config: NeighborhoodConfig,
}

impl NeighborhoodBuilder {
    pub fn new(config: NeighborhoodConfig) -> Self {
        Self { config }
    }

    /// Constructs the membership matrix.
    ///
    /// The effective cutoff depends on the metric: layout-weighted shortest
    /// paths scale the radius by the horizontal layout extent, unweighted
    /// shortest paths use the radius as a hop-count bound. A non-positive
    /// radius degrades to self-only neighborhoods with a warning.
    pub fn build(&self, network: &Network) -> Result<NeighborhoodMatrix> {
        let weighted = self.config.metric == NodeDistanceMetric::ShortpathWeightedLayout;

        let cutoff = match self.config.metric {
            NodeDistanceMetric::ShortpathWeightedLayout => {
                let extent = network.layout_extent().ok_or_else(|| {
                    SafeError::validation(
                        "metric 'shortpath_weighted_layout' requires node layout coordinates",
                    )
                })?;
                self.config.radius * extent
            }
            NodeDistanceMetric::Shortpath => self.config.radius,
        };

        if cutoff <= 0.0 {
            log::warn!(
                "non-positive neighborhood radius ({:.4}): neighborhoods collapse to self-only",
                cutoff
            );
        }
        // Distance-to-self is zero, so a zero cutoff still admits the node itself.
        let cutoff = cutoff.max(0.0);

        let n = network.num_nodes;
        let reached: Vec<Vec<usize>> = (0..n)
            .into_par_iter()
            .map(|source| truncated_dijkstra(network, source, cutoff, weighted))
            .collect();

        let mut membership = Array2::zeros((n, n));
        for (source, members) in reached.iter().enumerate() {
            for &target in members {
                membership[[source, target]] = 1.0;
            }
        }

        let matrix = NeighborhoodMatrix { membership };
        let (mean, std) = matrix.size_stats();
        log::info!(
            "node distance metric: {:?}, radius {:.3} ({:?}, effective cutoff {:.3})",
            self.config.metric,
            self.config.radius,
            self.config.radius_type,
            cutoff
        );
        log::info!("nodes per neighborhood (mean +/- std): {:.2} +/- {:.2}", mean, std);

        Ok(matrix)
    }
}

impl Default for NeighborhoodBuilder {
    fn default() -> Self {
        Self::new(NeighborhoodConfig::default())
    }
}

/// Dijkstra from `source`, exploring no further than `cutoff`.
///
/// Returns every node whose shortest-path distance is within the cutoff,
/// source included. With `weighted` unset all edges count as length 1.
fn truncated_dijkstra(network: &Network, source: usize, cutoff: f64, weighted: bool) -> Vec<usize> {
    let n = network.num_nodes;
    let mut distance = vec![f64::INFINITY; n];
    let mut settled = vec![false; n];
    let mut heap = BinaryHeap::new();

    distance[source] = 0.0;
    heap.push(Visit { distance: 0.0, node: source });

    let mut reached = Vec::new();

    while let Some(visit) = heap.pop() {
        if visit.distance > cutoff {
            break;
        }
        if settled[visit.node] {
            continue;
        }
        settled[visit.node] = true;
        reached.push(visit.node);

        for &neighbor in &network.adjacency[visit.node] {
            if settled[neighbor] {
                continue;
            }
            let length = if weighted {
                network.edge_length(visit.node, neighbor)
            } else {
                1.0
            };
            let candidate = visit.distance + length;
            if candidate <= cutoff && candidate < distance[neighbor] {
                distance[neighbor] = candidate;
                heap.push(Visit { distance: candidate, node: neighbor });
            }
        }
    }

    reached
}

/// The builder never emits relative cutoffs itself; this helper exists for
/// collaborators that resolve a relative radius before constructing a config.
pub fn resolve_radius(radius: f64, radius_type: RadiusType, extent: f64) -> f64 {
    match radius_type {
        RadiusType::Absolute => radius,
        RadiusType::Relative => radius * extent,
    }
}
