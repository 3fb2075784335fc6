//! Core data types for the SAFE enrichment pipeline.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Spatial network under analysis.
///
/// Owned by the caller and immutable for the duration of an analysis. The
/// adjacency structure drives neighborhood construction and the
/// connected-component check; the optional layout drives radius scaling for
/// the layout-weighted distance metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    /// Number of nodes in the network
    pub num_nodes: usize,

    /// Number of undirected edges
    pub num_edges: usize,

    /// Adjacency list representation: node -> list of neighbors
    pub adjacency: Vec<Vec<usize>>,

    /// Optional: edge lengths keyed by (min, max) endpoint pair
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_lengths: Option<HashMap<(usize, usize), f64>>,

    /// Optional: per-node 2D layout coordinates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<Vec<[f64; 2]>>,
}

impl Network {
    /// Creates a new empty network with the specified number of nodes.
    pub fn new(num_nodes: usize) -> Self {
        Self {
            num_nodes,
            num_edges: 0,
            adjacency: vec![Vec::new(); num_nodes],
            edge_lengths: None,
            layout: None,
        }
    }

    /// Adds an undirected unit-length edge between two nodes.
    pub fn add_edge(&mut self, u: usize, v: usize) {
        if u < self.num_nodes && v < self.num_nodes && u != v {
            self.adjacency[u].push(v);
            self.adjacency[v].push(u);
            self.num_edges += 1;
        }
    }

    /// Adds an undirected edge with an explicit length.
    pub fn add_edge_with_length(&mut self, u: usize, v: usize, length: f64) {
        if u < self.num_nodes && v < self.num_nodes && u != v {
            self.adjacency[u].push(v);
            self.adjacency[v].push(u);
            self.num_edges += 1;
            self.edge_lengths
                .get_or_insert_with(HashMap::new)
                .insert((u.min(v), u.max(v)), length);
        }
    }

    /// Sets the 2D layout coordinates for all nodes.
    pub fn set_layout(&mut self, layout: Vec<[f64; 2]>) {
        self.layout = Some(layout);
    }

    /// Length of the edge between two adjacent nodes (1.0 if no explicit length).
    pub fn edge_length(&self, u: usize, v: usize) -> f64 {
        self.edge_lengths
            .as_ref()
            .and_then(|lengths| lengths.get(&(u.min(v), u.max(v))))
            .copied()
            .unwrap_or(1.0)
    }

    /// Horizontal extent of the layout: max(x) - min(x) over all nodes.
    ///
    /// Returns None when no layout is attached or the network is empty.
    pub fn layout_extent(&self) -> Option<f64> {
        let layout = self.layout.as_ref()?;
        if layout.is_empty() {
            return None;
        }
        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        for position in layout {
            min_x = min_x.min(position[0]);
            max_x = max_x.max(position[0]);
        }
        Some(max_x - min_x)
    }
}

/// Node-by-attribute value matrix with an explicit per-cell presence mask.
///
/// Missing values are structural: a cell with `present == false` holds 0.0
/// in the value array and never participates in arithmetic. This replaces
/// marker-value encodings where a sentinel number doubles as data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeMatrix {
    values: Array2<f64>,
    present: Array2<bool>,
    names: Vec<String>,
}

impl AttributeMatrix {
    /// Creates an all-missing matrix for `num_nodes` nodes and the given attributes.
    pub fn new(num_nodes: usize, names: Vec<String>) -> Self {
        let num_attributes = names.len();
        Self {
            values: Array2::zeros((num_nodes, num_attributes)),
            present: Array2::from_elem((num_nodes, num_attributes), false),
            names,
        }
    }

    /// Builds a matrix from per-node rows of optional values.
    ///
    /// Every row must have exactly one entry per attribute.
    pub fn from_rows(rows: &[Vec<Option<f64>>], names: Vec<String>) -> crate::Result<Self> {
        let mut matrix = Self::new(rows.len(), names);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != matrix.num_attributes() {
                return Err(crate::SafeError::validation(format!(
                    "row {} has {} entries, expected {}",
                    i,
                    row.len(),
                    matrix.num_attributes()
                )));
            }
            for (j, cell) in row.iter().enumerate() {
                if let Some(value) = cell {
                    matrix.set(i, j, *value);
                }
            }
        }
        Ok(matrix)
    }

    /// Sets one cell to a present value.
    pub fn set(&mut self, node: usize, attribute: usize, value: f64) {
        self.values[[node, attribute]] = value;
        self.present[[node, attribute]] = true;
    }

    /// Clears one cell back to missing.
    pub fn clear(&mut self, node: usize, attribute: usize) {
        self.values[[node, attribute]] = 0.0;
        self.present[[node, attribute]] = false;
    }

    /// Reads one cell; None when missing.
    pub fn get(&self, node: usize, attribute: usize) -> Option<f64> {
        if self.present[[node, attribute]] {
            Some(self.values[[node, attribute]])
        } else {
            None
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.values.nrows()
    }

    pub fn num_attributes(&self) -> usize {
        self.values.ncols()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name(&self, attribute: usize) -> &str {
        &self.names[attribute]
    }

    /// Value matrix with missing cells fixed at 0.0.
    pub fn values_or_zero(&self) -> &Array2<f64> {
        &self.values
    }

    /// Presence mask as a 0.0/1.0 matrix, ready for matrix products.
    pub fn presence_matrix(&self) -> Array2<f64> {
        self.present.map(|&p| if p { 1.0 } else { 0.0 })
    }

    pub fn is_present(&self, node: usize, attribute: usize) -> bool {
        self.present[[node, attribute]]
    }

    /// True when every present value across the whole matrix is 0.0 or 1.0.
    pub fn is_binary(&self) -> bool {
        self.values
            .iter()
            .zip(self.present.iter())
            .all(|(&value, &present)| !present || value == 0.0 || value == 1.0)
    }

    /// Indices of rows carrying at least one present value.
    pub fn rows_with_data(&self) -> Vec<usize> {
        (0..self.num_nodes())
            .filter(|&i| (0..self.num_attributes()).any(|j| self.present[[i, j]]))
            .collect()
    }

    /// Number of present values in one attribute column.
    pub fn column_data_count(&self, attribute: usize) -> usize {
        (0..self.num_nodes())
            .filter(|&i| self.present[[i, attribute]])
            .count()
    }
}

/// Per-attribute results accumulated across the pipeline stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeRecord {
    /// Attribute index (column in the attribute matrix)
    pub index: usize,

    /// Attribute name (opaque to the core)
    pub name: String,

    /// Enrichment breadth: number of significantly enriched neighborhoods
    pub num_enriched_neighborhoods: usize,

    /// Whether the attribute passed breadth and unimodality requirements
    pub is_top: bool,

    /// Connected components of the enriched subnetwork (0 if never checked)
    pub num_connected_components: usize,

    /// Domain id after clustering and trimming (0 = no domain)
    pub domain: usize,
}

/// One attribute domain: an id and its member attributes.
///
/// The label text for a domain is produced by an external summarizer from
/// `attribute_names`; the core only groups the names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainRecord {
    pub id: usize,
    pub attribute_indices: Vec<usize>,
    pub attribute_names: Vec<String>,
}

/// Per-node domain assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDomainAssignment {
    /// Primary domain id per node (0 = no domain)
    pub primary_domain: Vec<usize>,

    /// Raw NES of the strongest attribute of the primary domain at each node
    pub primary_nes: Vec<f64>,

    /// Number of distinct domains with at least one enriched attribute at each node
    pub enriched_domain_count: Vec<usize>,
}

impl NodeDomainAssignment {
    /// Creates an all-unassigned table for `num_nodes` nodes.
    pub fn unassigned(num_nodes: usize) -> Self {
        Self {
            primary_domain: vec![0; num_nodes],
            primary_nes: vec![0.0; num_nodes],
            enriched_domain_count: vec![0; num_nodes],
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.primary_domain.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_creation() {
        let mut network = Network::new(5);
        network.add_edge(0, 1);
        network.add_edge(1, 2);
        network.add_edge(2, 3);

        assert_eq!(network.num_nodes, 5);
        assert_eq!(network.num_edges, 3);
        assert_eq!(network.adjacency[1], vec![0, 2]);
        assert_eq!(network.edge_length(0, 1), 1.0);
    }

    #[test]
    fn test_edge_lengths_symmetric_lookup() {
        let mut network = Network::new(3);
        network.add_edge_with_length(2, 0, 4.5);

        assert_eq!(network.edge_length(0, 2), 4.5);
        assert_eq!(network.edge_length(2, 0), 4.5);
    }

    #[test]
    fn test_layout_extent() {
        let mut network = Network::new(3);
        assert!(network.layout_extent().is_none());

        network.set_layout(vec![[-2.0, 0.0], [1.0, 5.0], [3.0, -1.0]]);
        assert_eq!(network.layout_extent(), Some(5.0));
    }

    #[test]
    fn test_attribute_matrix_mask() {
        let mut matrix = AttributeMatrix::new(3, vec!["a".to_string(), "b".to_string()]);
        matrix.set(0, 0, 1.0);
        matrix.set(2, 1, -0.5);

        assert_eq!(matrix.get(0, 0), Some(1.0));
        assert_eq!(matrix.get(1, 0), None);
        assert_eq!(matrix.values_or_zero()[[1, 0]], 0.0);
        assert_eq!(matrix.rows_with_data(), vec![0, 2]);
        assert_eq!(matrix.column_data_count(1), 1);

        matrix.clear(0, 0);
        assert_eq!(matrix.get(0, 0), None);
    }

    #[test]
    fn test_binary_detection() {
        let mut matrix = AttributeMatrix::new(3, vec!["a".to_string()]);
        matrix.set(0, 0, 1.0);
        matrix.set(1, 0, 0.0);
        assert!(matrix.is_binary());

        matrix.set(2, 0, 0.25);
        assert!(!matrix.is_binary());
    }

    #[test]
    fn test_binary_detection_ignores_missing() {
        // An all-missing matrix is trivially binary; missing cells hold 0.0
        // internally but must not be read as data.
        let matrix = AttributeMatrix::new(4, vec!["a".to_string()]);
        assert!(matrix.is_binary());
        assert!(matrix.rows_with_data().is_empty());
    }

    #[test]
    fn test_from_rows_shape_check() {
        let rows = vec![vec![Some(1.0)], vec![Some(2.0), None]];
        let result = AttributeMatrix::from_rows(&rows, vec!["a".to_string()]);
        assert!(result.is_err());
    }
}
