//! End-to-end pipeline tests on small hand-checked networks.

use safe_core::{
    AttributeMatrix, AttributeSign, EnrichmentMode, Network, NeighborhoodConfig,
    NodeDistanceMetric, RadiusType, SafeConfig,
};
use safe_pipeline::{run_analysis, EnrichmentMethod};

/// Path graph 0-1-2-...-(n-1) with unit edges.
fn path_graph(n: usize) -> Network {
    let mut network = Network::new(n);
    for i in 0..n - 1 {
        network.add_edge(i, i + 1);
    }
    network
}

fn shortpath_config(radius: f64) -> SafeConfig {
    SafeConfig {
        neighborhood: NeighborhoodConfig {
            metric: NodeDistanceMetric::Shortpath,
            radius,
            radius_type: RadiusType::Absolute,
        },
        ..SafeConfig::default()
    }
}

/// 30-node path with two disjoint binary attribute blocks and one empty
/// attribute. With radius 3 and Bonferroni over 3 attributes, block A is
/// significant exactly on nodes 2..=11 and block B on nodes 18..=27 (10
/// neighborhoods each), so both pass the default breadth minimum, both are
/// connected, and their enrichment vectors are disjoint.
fn two_block_fixture() -> (Network, AttributeMatrix) {
    let network = path_graph(30);
    let mut attributes = AttributeMatrix::new(
        30,
        vec![
            "block_a".to_string(),
            "block_b".to_string(),
            "never_present".to_string(),
        ],
    );
    for node in 0..30 {
        attributes.set(node, 0, if node < 15 { 1.0 } else { 0.0 });
        attributes.set(node, 1, if node >= 15 { 1.0 } else { 0.0 });
        attributes.set(node, 2, 0.0);
    }
    (network, attributes)
}

#[test]
fn test_two_block_binary_analysis() {
    let (network, attributes) = two_block_fixture();
    let analysis = run_analysis(&network, &attributes, &shortpath_config(3.0)).unwrap();

    assert_eq!(analysis.enrichment.method, EnrichmentMethod::Hypergeometric);
    assert_eq!(analysis.enrichment.nes.dim(), (30, 3));
    assert_eq!(analysis.enrichment.nes_binary.dim(), (30, 3));

    // Significance pattern computed by hand from the hypergeometric tail.
    for node in 0..30 {
        let expect_a = (2..=11).contains(&node);
        let expect_b = (18..=27).contains(&node);
        assert_eq!(
            analysis.enrichment.nes_binary[[node, 0]] != 0,
            expect_a,
            "attribute A at node {}",
            node
        );
        assert_eq!(
            analysis.enrichment.nes_binary[[node, 1]] != 0,
            expect_b,
            "attribute B at node {}",
            node
        );
        assert_eq!(analysis.enrichment.nes_binary[[node, 2]], 0);
    }
    assert_eq!(analysis.enrichment.num_enriched_neighborhoods, vec![10, 10, 0]);

    // Attribute table.
    assert!(analysis.attributes[0].is_top);
    assert!(analysis.attributes[1].is_top);
    assert!(!analysis.attributes[2].is_top);
    assert_eq!(analysis.attributes[0].num_connected_components, 1);
    assert_eq!(analysis.attributes[2].num_enriched_neighborhoods, 0);

    // Disjoint enrichment vectors: two domains, one attribute each,
    // numbered densely from 1.
    assert_eq!(analysis.domains.len(), 2);
    assert_eq!(analysis.domains[0].id, 1);
    assert_eq!(analysis.domains[0].attribute_indices, vec![0]);
    assert_eq!(analysis.domains[0].attribute_names, vec!["block_a".to_string()]);
    assert_eq!(analysis.domains[1].id, 2);
    assert_eq!(analysis.domains[1].attribute_indices, vec![1]);
    assert_eq!(analysis.attributes[0].domain, 1);
    assert_eq!(analysis.attributes[1].domain, 2);
    assert_eq!(analysis.attributes[2].domain, 0);

    // Node assignment follows the enrichment blocks.
    for node in 0..30 {
        let expected = if (2..=11).contains(&node) {
            1
        } else if (18..=27).contains(&node) {
            2
        } else {
            0
        };
        assert_eq!(analysis.nodes.primary_domain[node], expected, "node {}", node);
    }
    // Primary NES is the raw NES of the winning attribute.
    let cutoff = -(0.05f64).log10();
    assert!(analysis.nodes.primary_nes[5] > cutoff);
    assert_eq!(analysis.nodes.primary_nes[5], analysis.enrichment.nes[[5, 0]]);
    assert_eq!(analysis.nodes.primary_nes[0], 0.0);

    // Domain ids used anywhere form a dense range {0, 1, 2}.
    let max_id = analysis
        .nodes
        .primary_domain
        .iter()
        .chain(analysis.attributes.iter().map(|record| &record.domain))
        .max()
        .copied()
        .unwrap();
    assert_eq!(max_id, 2);
}

#[test]
fn test_quantitative_run_degrades_to_no_domains() {
    // A single quantitative attribute cannot produce two top attributes;
    // the pipeline must finish with every node in domain 0 instead of
    // failing inside the clusterer.
    let network = path_graph(4);
    let mut attributes = AttributeMatrix::new(4, vec!["gradient".to_string()]);
    attributes.set(0, 0, 1.0);
    attributes.set(1, 0, 1.0);
    attributes.set(2, 0, 0.0);
    attributes.set(3, 0, 0.0);

    let mut config = shortpath_config(1.0);
    config.enrichment.sign = AttributeSign::Both;
    config.enrichment.mode = EnrichmentMode::Randomization;
    config.enrichment.num_permutations = 100;
    config.enrichment.seed = Some(42);

    let analysis = run_analysis(&network, &attributes, &config).unwrap();

    assert_eq!(analysis.enrichment.method, EnrichmentMethod::Permutation);
    for &nes in analysis.enrichment.nes.iter() {
        assert!(nes.is_finite());
    }
    assert!(analysis.domains.is_empty());
    assert!(analysis.nodes.primary_domain.iter().all(|&d| d == 0));
    assert!(analysis.attributes.iter().all(|record| record.domain == 0));

    // Same seed, same result, bit for bit.
    let again = run_analysis(&network, &attributes, &config).unwrap();
    assert_eq!(analysis.enrichment.nes, again.enrichment.nes);
}

#[test]
fn test_shape_mismatch_is_rejected() {
    let network = path_graph(4);
    let attributes = AttributeMatrix::new(5, vec!["a".to_string()]);
    let result = run_analysis(&network, &attributes, &shortpath_config(1.0));
    assert!(result.is_err());
}

#[test]
fn test_analysis_serialization_round_trip() {
    let (network, attributes) = two_block_fixture();
    let analysis = run_analysis(&network, &attributes, &shortpath_config(3.0)).unwrap();

    let json = serde_json::to_string(&analysis).unwrap();
    assert!(json.contains("block_a"));
    assert!(json.contains("primary_domain"));

    let back: safe_pipeline::SafeAnalysis = serde_json::from_str(&json).unwrap();
    assert_eq!(back.domains.len(), analysis.domains.len());
    assert_eq!(back.nodes.primary_domain, analysis.nodes.primary_domain);
    assert_eq!(back.enrichment.nes, analysis.enrichment.nes);
}

#[test]
fn test_empty_enrichment_keeps_everything_unassigned() {
    // Nothing is ever significant: no top attributes, no domains, trimmed
    // output still well-formed.
    let network = path_graph(6);
    let mut attributes = AttributeMatrix::new(6, vec!["sparse".to_string(), "sparser".to_string()]);
    attributes.set(0, 0, 1.0);
    attributes.set(5, 1, 1.0);

    let analysis = run_analysis(&network, &attributes, &shortpath_config(1.0)).unwrap();
    assert!(analysis.domains.is_empty());
    assert!(analysis.nodes.primary_domain.iter().all(|&d| d == 0));
    assert!(analysis.nodes.primary_nes.iter().all(|&v| v == 0.0));
}

#[test]
fn zz_debug5() {
    let x: f64 = 0.9204029621715477;
    let s = serde_json::to_string(&x).unwrap();
    let y: f64 = serde_json::from_str(&s).unwrap();
    println!("x_bits={:x} s={} y_bits={:x} eq={}", x.to_bits(), s, y.to_bits(), x==y);
}
