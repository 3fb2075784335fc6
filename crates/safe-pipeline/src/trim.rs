//! Domain trimming.
//!
//! Domains that are the primary choice of too few nodes are dissolved:
//! their attributes and nodes revert to domain 0 and the surviving ids are
//! renumbered densely, preserving relative order. Running the trimmer on an
//! already-trimmed result changes nothing.

use crate::domains::DomainPartition;
use safe_core::NodeDomainAssignment;

/// Summary of one trimming pass.
#[derive(Debug, Clone, Copy)]
pub struct TrimOutcome {
    /// Domains dissolved in this pass
    pub removed: usize,

    /// Domains surviving (ids 1..=num_domains after renumbering)
    pub num_domains: usize,
}

/// Dissolves under-supported domains and compacts the id range.
pub struct DomainTrimmer {
    min_size: usize,
}

impl DomainTrimmer {
    pub fn new(min_size: usize) -> Self {
        Self { min_size }
    }

    pub fn trim(
        &self,
        partition: &mut DomainPartition,
        assignment: &mut NodeDomainAssignment,
    ) -> TrimOutcome {
        // Support per domain: how many nodes chose it as primary.
        let mut support = vec![0usize; partition.num_domains + 1];
        for &domain in &assignment.primary_domain {
            if domain > 0 {
                support[domain] += 1;
            }
        }

        let removed: Vec<usize> = (1..=partition.num_domains)
            .filter(|&domain| support[domain] < self.min_size)
            .collect();

        let is_removed = |domain: usize| domain > 0 && removed.binary_search(&domain).is_ok();

        for domain in partition.attribute_domains.iter_mut() {
            if is_removed(*domain) {
                *domain = 0;
            }
        }
        for node in 0..assignment.num_nodes() {
            if is_removed(assignment.primary_domain[node]) {
                assignment.primary_domain[node] = 0;
                assignment.primary_nes[node] = 0.0;
            }
        }

        // Dense renumbering: surviving ids map to 1..=K in order.
        let mut renumber = vec![0usize; partition.num_domains + 1];
        let mut next_id = 0;
        for domain in 1..=partition.num_domains {
            if !is_removed(domain) {
                next_id += 1;
                renumber[domain] = next_id;
            }
        }

        for domain in partition.attribute_domains.iter_mut() {
            *domain = renumber[*domain];
        }
        for domain in assignment.primary_domain.iter_mut() {
            *domain = renumber[*domain];
        }
        partition.num_domains = next_id;

        log::info!(
            "removed {} domain(s) with fewer than {} primary nodes; {} remain",
            removed.len(),
            self.min_size,
            next_id
        );

        TrimOutcome { removed: removed.len(), num_domains: next_id }
    }
}
