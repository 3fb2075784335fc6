//! Analysis configuration.
//!
//! Every option the pipeline understands is an explicit enum or a typed
//! field with a serde default. Unknown option names fail at parse time;
//! there are no silent fallbacks.

use crate::errors::SafeError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Node-to-node distance definition used for neighborhood construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeDistanceMetric {
    /// Unweighted shortest paths (hop counts)
    Shortpath,
    /// Shortest paths over edge lengths, radius scaled by the layout extent
    ShortpathWeightedLayout,
}

impl FromStr for NodeDistanceMetric {
    type Err = SafeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shortpath" => Ok(NodeDistanceMetric::Shortpath),
            "shortpath_weighted_layout" => Ok(NodeDistanceMetric::ShortpathWeightedLayout),
            other => Err(SafeError::config(format!(
                "unknown node distance metric '{}' (expected 'shortpath' or 'shortpath_weighted_layout')",
                other
            ))),
        }
    }
}

/// Interpretation of the neighborhood radius value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadiusType {
    /// Radius is a distance in the metric's own units
    Absolute,
    /// Radius is a fraction of the network's layout extent
    Relative,
}

impl FromStr for RadiusType {
    type Err = SafeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "absolute" => Ok(RadiusType::Absolute),
            "relative" => Ok(RadiusType::Relative),
            other => Err(SafeError::config(format!(
                "unknown radius type '{}' (expected 'absolute' or 'relative')",
                other
            ))),
        }
    }
}

/// Which tail(s) of the attribute distribution count as enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeSign {
    /// Enrichment of high values only
    Highest,
    /// Enrichment of low values only
    Lowest,
    /// Signed score: positive tail minus negative tail
    Both,
}

impl FromStr for AttributeSign {
    type Err = SafeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "highest" => Ok(AttributeSign::Highest),
            "lowest" => Ok(AttributeSign::Lowest),
            "both" => Ok(AttributeSign::Both),
            other => Err(SafeError::config(format!(
                "unknown attribute sign '{}' (expected 'highest', 'lowest' or 'both')",
                other
            ))),
        }
    }
}

/// Significance test selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentMode {
    /// Exact hypergeometric test when the attribute values are binary,
    /// permutation test otherwise (auto-detected per matrix)
    Hypergeometric,
    /// Force the permutation test regardless of value types
    Randomization,
}

impl FromStr for EnrichmentMode {
    type Err = SafeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hypergeometric" => Ok(EnrichmentMode::Hypergeometric),
            "randomization" => Ok(EnrichmentMode::Randomization),
            other => Err(SafeError::config(format!(
                "unknown enrichment type '{}' (expected 'hypergeometric' or 'randomization')",
                other
            ))),
        }
    }
}

/// Spatial unimodality check applied to top-attribute candidates.
///
/// Only the connectivity check is implemented; the enum exists so that an
/// unknown name in a configuration file is rejected up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnimodalityMetric {
    /// Enriched region must form a single connected component
    Connectivity,
}

impl FromStr for UnimodalityMetric {
    type Err = SafeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connectivity" => Ok(UnimodalityMetric::Connectivity),
            other => Err(SafeError::config(format!(
                "unknown unimodality metric '{}' (expected 'connectivity')",
                other
            ))),
        }
    }
}

/// Distance between attribute enrichment profiles for domain clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeDistanceMetric {
    /// Jaccard distance over binary enrichment vectors
    Jaccard,
}

impl FromStr for AttributeDistanceMetric {
    type Err = SafeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jaccard" => Ok(AttributeDistanceMetric::Jaccard),
            other => Err(SafeError::config(format!(
                "unknown attribute distance metric '{}' (expected 'jaccard')",
                other
            ))),
        }
    }
}

/// Configuration for neighborhood construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborhoodConfig {
    /// Node distance definition
    #[serde(default = "default_node_distance_metric")]
    pub metric: NodeDistanceMetric,

    /// Neighborhood radius
    #[serde(default = "default_neighborhood_radius")]
    pub radius: f64,

    /// Radius interpretation (reported in diagnostics)
    #[serde(default = "default_radius_type")]
    pub radius_type: RadiusType,
}

fn default_node_distance_metric() -> NodeDistanceMetric {
    NodeDistanceMetric::ShortpathWeightedLayout
}
fn default_neighborhood_radius() -> f64 {
    0.15
}
fn default_radius_type() -> RadiusType {
    RadiusType::Relative
}

impl Default for NeighborhoodConfig {
    fn default() -> Self {
        Self {
            metric: default_node_distance_metric(),
            radius: default_neighborhood_radius(),
            radius_type: default_radius_type(),
        }
    }
}

/// Configuration for significance computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Enrichment direction policy
    #[serde(default = "default_attribute_sign")]
    pub sign: AttributeSign,

    /// Test selection
    #[serde(default = "default_enrichment_mode")]
    pub mode: EnrichmentMode,

    /// Number of permutation iterations (permutation path only)
    #[serde(default = "default_num_permutations")]
    pub num_permutations: usize,

    /// Significance threshold on raw p-values
    #[serde(default = "default_enrichment_threshold")]
    pub threshold: f64,

    /// Apply Bonferroni correction (hypergeometric path only)
    #[serde(default = "default_multiple_testing")]
    pub multiple_testing: bool,

    /// Seed for the permutation stream; None draws one from the OS
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_attribute_sign() -> AttributeSign {
    AttributeSign::Highest
}
fn default_enrichment_mode() -> EnrichmentMode {
    EnrichmentMode::Hypergeometric
}
fn default_num_permutations() -> usize {
    1000
}
fn default_enrichment_threshold() -> f64 {
    0.05
}
fn default_multiple_testing() -> bool {
    true
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            sign: default_attribute_sign(),
            mode: default_enrichment_mode(),
            num_permutations: default_num_permutations(),
            threshold: default_enrichment_threshold(),
            multiple_testing: default_multiple_testing(),
            seed: None,
        }
    }
}

impl EnrichmentConfig {
    /// NES value above which a neighborhood counts as enriched.
    pub fn nes_cutoff(&self) -> f64 {
        -self.threshold.log10()
    }
}

/// Configuration for top-attribute selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopAttributeConfig {
    /// Minimum number of enriched neighborhoods
    #[serde(default = "default_min_enrichment_size")]
    pub min_size: usize,

    /// Spatial unimodality check
    #[serde(default = "default_unimodality_metric")]
    pub unimodality: UnimodalityMetric,
}

fn default_min_enrichment_size() -> usize {
    10
}
fn default_unimodality_metric() -> UnimodalityMetric {
    UnimodalityMetric::Connectivity
}

impl Default for TopAttributeConfig {
    fn default() -> Self {
        Self {
            min_size: default_min_enrichment_size(),
            unimodality: default_unimodality_metric(),
        }
    }
}

/// Configuration for domain clustering and trimming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Distance between attribute enrichment profiles
    #[serde(default = "default_attribute_distance_metric")]
    pub distance_metric: AttributeDistanceMetric,

    /// Tree cut height as a fraction of the maximum merge height
    #[serde(default = "default_attribute_distance_threshold")]
    pub distance_threshold: f64,

    /// Minimum number of primary-assigned nodes a domain must keep
    #[serde(default = "default_min_enrichment_size")]
    pub min_size: usize,
}

fn default_attribute_distance_metric() -> AttributeDistanceMetric {
    AttributeDistanceMetric::Jaccard
}
fn default_attribute_distance_threshold() -> f64 {
    0.75
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            distance_metric: default_attribute_distance_metric(),
            distance_threshold: default_attribute_distance_threshold(),
            min_size: default_min_enrichment_size(),
        }
    }
}

/// Umbrella configuration for a full analysis run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SafeConfig {
    #[serde(default)]
    pub neighborhood: NeighborhoodConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub selection: TopAttributeConfig,
    #[serde(default)]
    pub domains: DomainConfig,
}

impl SafeConfig {
    /// Validates cross-field constraints that serde cannot express.
    pub fn validate(&self) -> crate::errors::Result<()> {
        if !(0.0..=1.0).contains(&self.enrichment.threshold) || self.enrichment.threshold == 0.0 {
            return Err(SafeError::config(format!(
                "enrichment threshold must be in (0, 1], got {}",
                self.enrichment.threshold
            )));
        }
        if self.enrichment.num_permutations == 0 {
            return Err(SafeError::config(
                "num_permutations must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.domains.distance_threshold) {
            return Err(SafeError::config(format!(
                "attribute distance threshold must be in [0, 1], got {}",
                self.domains.distance_threshold
            )));
        }
        Ok(())
    }
}
