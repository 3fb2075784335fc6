//! Domain clustering and node-to-domain assignment.
//!
//! Top attributes with similar spatial enrichment patterns are grouped into
//! domains by average-linkage clustering over their binary enrichment
//! vectors. Every node is then assigned to the domain for which it has the
//! most enriched member attributes. Domain id 0 is reserved for "no domain"
//! and is never produced by the clustering step.

use crate::attributes::TopAttributes;
use crate::linkage::average_linkage;
use ndarray::Array2;
use safe_core::{
    AttributeDistanceMetric, DomainConfig, NodeDomainAssignment, Result, SafeError,
};

/// Per-attribute domain membership.
#[derive(Debug, Clone)]
pub struct DomainPartition {
    /// Domain id per attribute (0 = no domain)
    pub attribute_domains: Vec<usize>,

    /// Number of domains (ids run 1..=num_domains)
    pub num_domains: usize,
}

impl DomainPartition {
    /// Partition with every attribute in domain 0.
    pub fn none(num_attributes: usize) -> Self {
        Self {
            attribute_domains: vec![0; num_attributes],
            num_domains: 0,
        }
    }

    /// Member attribute indices per domain id (1..=num_domains).
    pub fn members(&self, domain: usize) -> Vec<usize> {
        self.attribute_domains
            .iter()
            .enumerate()
            .filter_map(|(attribute, &d)| (d == domain).then_some(attribute))
            .collect()
    }
}

/// Clusters top attributes into domains and assigns nodes to them.
pub struct DomainClusterer {
    config: DomainConfig,
}

impl DomainClusterer {
    pub fn new(config: DomainConfig) -> Self {
        Self { config }
    }

    /// Groups the top attributes into domains.
    ///
    /// Fails with an explicit insufficient-attributes condition when fewer
    /// than two top attributes exist; callers are expected to degrade to an
    /// all-domain-0 result rather than abort the analysis.
    pub fn cluster(&self, nes_binary: &Array2<u8>, top: &TopAttributes) -> Result<DomainPartition> {
        let top_indices = top.top_indices();
        if top_indices.len() < 2 {
            return Err(SafeError::InsufficientAttributes { found: top_indices.len() });
        }

        let distances = match self.config.distance_metric {
            AttributeDistanceMetric::Jaccard => jaccard_distances(nes_binary, &top_indices),
        };

        let dendrogram = average_linkage(&distances);
        let cut_height = dendrogram.max_height() * self.config.distance_threshold;
        let labels = dendrogram.cut(cut_height);

        let mut attribute_domains = vec![0; nes_binary.ncols()];
        for (position, &attribute) in top_indices.iter().enumerate() {
            // Flat labels are 0-based; shift so 0 stays reserved.
            attribute_domains[attribute] = labels[position] + 1;
        }
        let num_domains = labels.iter().max().map_or(0, |&label| label + 1);

        let partition = DomainPartition { attribute_domains, num_domains };

        let sizes: Vec<usize> = (1..=num_domains)
            .map(|domain| partition.members(domain).len())
            .collect();
        log::info!(
            "domains: {} (containing {}-{} attributes)",
            num_domains,
            sizes.iter().min().copied().unwrap_or(0),
            sizes.iter().max().copied().unwrap_or(0)
        );

        Ok(partition)
    }

    /// Assigns every node a primary domain.
    ///
    /// The primary domain is the one with the most enriched member
    /// attributes at the node; ties go to the lowest domain id. A node with
    /// no enriched member attribute in any domain keeps domain 0 with a
    /// primary NES of 0. The primary NES is the maximum raw NES among the
    /// winning domain's attributes at the node.
    pub fn assign_nodes(
        &self,
        nes: &Array2<f64>,
        nes_binary: &Array2<u8>,
        partition: &DomainPartition,
    ) -> NodeDomainAssignment {
        let num_nodes = nes_binary.nrows();
        let mut assignment = NodeDomainAssignment::unassigned(num_nodes);

        for node in 0..num_nodes {
            let counts = enriched_counts_for_node(nes_binary, partition, node);

            let mut best_domain = 0;
            let mut best_count = 0;
            for (domain, &count) in counts.iter().enumerate().skip(1) {
                if count > best_count {
                    best_count = count;
                    best_domain = domain;
                }
            }

            assignment.enriched_domain_count[node] =
                counts.iter().skip(1).filter(|&&count| count > 0).count();

            if best_domain == 0 {
                continue;
            }
            assignment.primary_domain[node] = best_domain;
            assignment.primary_nes[node] = partition
                .members(best_domain)
                .iter()
                .map(|&attribute| nes[[node, attribute]])
                .fold(f64::NEG_INFINITY, f64::max);
        }

        assignment
    }
}

impl Default for DomainClusterer {
    fn default() -> Self {
        Self::new(DomainConfig::default())
    }
}

/// Enriched member-attribute counts per domain id (index 0 unused).
fn enriched_counts_for_node(
    nes_binary: &Array2<u8>,
    partition: &DomainPartition,
    node: usize,
) -> Vec<usize> {
    let mut counts = vec![0; partition.num_domains + 1];
    for (attribute, &domain) in partition.attribute_domains.iter().enumerate() {
        if domain > 0 && nes_binary[[node, attribute]] > 0 {
            counts[domain] += 1;
        }
    }
    counts
}

/// Recomputes the per-node enriched-domain counts against a partition.
///
/// Used after trimming, when dissolved domains must no longer contribute.
pub fn refresh_enriched_domain_counts(
    assignment: &mut NodeDomainAssignment,
    nes_binary: &Array2<u8>,
    partition: &DomainPartition,
) {
    for node in 0..assignment.num_nodes() {
        let counts = enriched_counts_for_node(nes_binary, partition, node);
        assignment.enriched_domain_count[node] =
            counts.iter().skip(1).filter(|&&count| count > 0).count();
    }
}

/// Jaccard distances between the binary enrichment vectors of the selected
/// attributes: disagreeing positions over positions where either is set.
fn jaccard_distances(nes_binary: &Array2<u8>, attributes: &[usize]) -> Array2<f64> {
    let k = attributes.len();
    let mut distances = Array2::zeros((k, k));
    for a in 0..k {
        for b in (a + 1)..k {
            let mut disagree = 0usize;
            let mut union = 0usize;
            for node in 0..nes_binary.nrows() {
                let left = nes_binary[[node, attributes[a]]] > 0;
                let right = nes_binary[[node, attributes[b]]] > 0;
                if left || right {
                    union += 1;
                    if left != right {
                        disagree += 1;
                    }
                }
            }
            let distance = if union == 0 { 0.0 } else { disagree as f64 / union as f64 };
            distances[[a, b]] = distance;
            distances[[b, a]] = distance;
        }
    }
    distances
}
