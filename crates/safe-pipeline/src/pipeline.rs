//! End-to-end analysis orchestration.
//!
//! The stages are threaded functionally: each takes the immutable pieces it
//! needs and returns new derived data. Only the trimming step mutates, and
//! it operates on values owned by this function.

use crate::attributes::TopAttributeSelector;
use crate::domains::{refresh_enriched_domain_counts, DomainClusterer, DomainPartition};
use crate::enrichment::{EnrichmentEngine, EnrichmentResult, NullProgress, ProgressSink};
use crate::neighborhood::NeighborhoodBuilder;
use crate::trim::DomainTrimmer;
use safe_core::{
    AttributeMatrix, AttributeRecord, DomainRecord, Network, NodeDomainAssignment, Result,
    SafeConfig, SafeError,
};
use serde::{Deserialize, Serialize};

/// Complete output of one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafeAnalysis {
    /// p-value, NES and binary enrichment matrices
    pub enrichment: EnrichmentResult,

    /// Augmented attribute table (breadth, top flag, components, domain)
    pub attributes: Vec<AttributeRecord>,

    /// Surviving domains with their member attributes
    pub domains: Vec<DomainRecord>,

    /// Per-node primary domain and NES
    pub nodes: NodeDomainAssignment,
}

/// Runs the full pipeline with default (silent) progress reporting.
pub fn run_analysis(
    network: &Network,
    attributes: &AttributeMatrix,
    config: &SafeConfig,
) -> Result<SafeAnalysis> {
    run_analysis_with_progress(network, attributes, config, &NullProgress)
}

/// Runs the full pipeline, reporting permutation progress to `progress`.
pub fn run_analysis_with_progress(
    network: &Network,
    attributes: &AttributeMatrix,
    config: &SafeConfig,
    progress: &dyn ProgressSink,
) -> Result<SafeAnalysis> {
    config.validate()?;
    if attributes.num_nodes() != network.num_nodes {
        return Err(SafeError::validation(format!(
            "attribute matrix has {} rows, network has {} nodes",
            attributes.num_nodes(),
            network.num_nodes
        )));
    }

    let neighborhoods = NeighborhoodBuilder::new(config.neighborhood.clone()).build(network)?;

    let enrichment =
        EnrichmentEngine::new(config.enrichment.clone()).compute(&neighborhoods, attributes, progress)?;

    let top = TopAttributeSelector::new(config.selection.clone()).select(
        network,
        &enrichment.nes_binary,
        &enrichment.num_enriched_neighborhoods,
    );

    let clusterer = DomainClusterer::new(config.domains.clone());
    let (mut partition, mut assignment) = match clusterer.cluster(&enrichment.nes_binary, &top) {
        Ok(partition) => {
            let assignment =
                clusterer.assign_nodes(&enrichment.nes, &enrichment.nes_binary, &partition);
            (partition, assignment)
        }
        Err(error) if error.is_degradable() => {
            log::warn!("{}; all nodes remain in domain 0", error);
            (
                DomainPartition::none(attributes.num_attributes()),
                NodeDomainAssignment::unassigned(network.num_nodes),
            )
        }
        Err(error) => return Err(error),
    };

    DomainTrimmer::new(config.domains.min_size).trim(&mut partition, &mut assignment);
    refresh_enriched_domain_counts(&mut assignment, &enrichment.nes_binary, &partition);

    let attribute_records = build_attribute_records(attributes, &enrichment, &top, &partition);
    let domain_records = build_domain_records(attributes, &partition);

    Ok(SafeAnalysis {
        enrichment,
        attributes: attribute_records,
        domains: domain_records,
        nodes: assignment,
    })
}

fn build_attribute_records(
    attributes: &AttributeMatrix,
    enrichment: &EnrichmentResult,
    top: &crate::attributes::TopAttributes,
    partition: &DomainPartition,
) -> Vec<AttributeRecord> {
    (0..attributes.num_attributes())
        .map(|index| AttributeRecord {
            index,
            name: attributes.name(index).to_string(),
            num_enriched_neighborhoods: enrichment.num_enriched_neighborhoods[index],
            is_top: top.is_top[index],
            num_connected_components: top.num_connected_components[index],
            domain: partition.attribute_domains[index],
        })
        .collect()
}

fn build_domain_records(
    attributes: &AttributeMatrix,
    partition: &DomainPartition,
) -> Vec<DomainRecord> {
    (1..=partition.num_domains)
        .map(|id| {
            let attribute_indices = partition.members(id);
            let attribute_names = attribute_indices
                .iter()
                .map(|&index| attributes.name(index).to_string())
                .collect();
            DomainRecord { id, attribute_indices, attribute_names }
        })
        .collect()
}
