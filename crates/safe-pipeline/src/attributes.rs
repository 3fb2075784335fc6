//! Top-attribute selection.
//!
//! An attribute qualifies as "top" when its enrichment is broad (enough
//! enriched neighborhoods) and spatially unimodal (the enriched nodes induce
//! a single connected subnetwork). Breadth without connectivity is not
//! enough: a fragmented enriched region signals a multimodal spatial
//! pattern.

use ndarray::Array2;
use safe_core::{Network, TopAttributeConfig, UnimodalityMetric};
use std::collections::VecDeque;

/// Output of the selection stage.
#[derive(Debug, Clone)]
pub struct TopAttributes {
    /// Whether each attribute passed both requirements
    pub is_top: Vec<bool>,

    /// Connected components of the enriched subnetwork.
    ///
    /// Only computed for attributes passing the breadth requirement; others
    /// keep 0.
    pub num_connected_components: Vec<usize>,
}

impl TopAttributes {
    /// Indices of the attributes marked top, in attribute order.
    pub fn top_indices(&self) -> Vec<usize> {
        self.is_top
            .iter()
            .enumerate()
            .filter_map(|(index, &top)| top.then_some(index))
            .collect()
    }
}

/// Marks attributes whose enrichment is broad and unimodal.
pub struct TopAttributeSelector {
    config: TopAttributeConfig,
}

impl TopAttributeSelector {
    pub fn new(config: TopAttributeConfig) -> Self {
        Self { config }
    }

    pub fn select(&self, network: &Network, nes_binary: &Array2<u8>, breadth: &[usize]) -> TopAttributes {
        let num_attributes = nes_binary.ncols();
        let mut is_top = vec![false; num_attributes];
        let mut num_connected_components = vec![0; num_attributes];

        for attribute in 0..num_attributes {
            if breadth[attribute] < self.config.min_size {
                continue;
            }

            let enriched: Vec<usize> = (0..nes_binary.nrows())
                .filter(|&node| nes_binary[[node, attribute]] > 0)
                .collect();

            match self.config.unimodality {
                UnimodalityMetric::Connectivity => {
                    let components = connected_components(network, &enriched);
                    num_connected_components[attribute] = components;
                    is_top[attribute] = components == 1;
                }
            }
        }

        let top_count = is_top.iter().filter(|&&t| t).count();
        log::info!("top attributes: {} of {}", top_count, num_attributes);

        TopAttributes { is_top, num_connected_components }
    }
}

impl Default for TopAttributeSelector {
    fn default() -> Self {
        Self::new(TopAttributeConfig::default())
    }
}

/// Connected components of the subgraph induced on `members`.
fn connected_components(network: &Network, members: &[usize]) -> usize {
    let mut in_subgraph = vec![false; network.num_nodes];
    for &node in members {
        in_subgraph[node] = true;
    }

    let mut visited = vec![false; network.num_nodes];
    let mut components = 0;

    for &start in members {
        if visited[start] {
            continue;
        }
        components += 1;
        visited[start] = true;
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            for &neighbor in &network.adjacency[node] {
                if in_subgraph[neighbor] && !visited[neighbor] {
                    visited[neighbor] = true;
                    queue.push_back(neighbor);
                }
            }
        }
    }

    components
}
