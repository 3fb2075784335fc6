//! Average-linkage agglomerative clustering.
//!
//! Operates on a precomputed symmetric distance matrix and records the merge
//! tree explicitly: leaves are numbered 0..n-1, the cluster created by merge
//! t is numbered n+t. Flat clusters are extracted with a *distance
//! criterion* — every merge at or below the cut height collapses — never by
//! a fixed cluster count. Average linkage is reducible, so the recorded
//! merge heights are non-decreasing and the qualifying merges form a prefix
//! of the merge list.

use ndarray::Array2;

/// One agglomerative merge step.
#[derive(Debug, Clone)]
pub struct Merge {
    /// Cluster id of the first child
    pub left: usize,
    /// Cluster id of the second child
    pub right: usize,
    /// Distance between the children at merge time
    pub height: f64,
    /// Number of leaves under the merged cluster
    pub size: usize,
}

/// Merge tree produced by [`average_linkage`].
#[derive(Debug, Clone)]
pub struct Dendrogram {
    num_leaves: usize,
    merges: Vec<Merge>,
}

impl Dendrogram {
    pub fn num_leaves(&self) -> usize {
        self.num_leaves
    }

    pub fn merges(&self) -> &[Merge] {
        &self.merges
    }

    /// Height of the final merge (0.0 for a single leaf).
    pub fn max_height(&self) -> f64 {
        self.merges
            .iter()
            .map(|merge| merge.height)
            .fold(0.0, f64::max)
    }

    /// Flat clusters at a height cut.
    ///
    /// Returns a 0-based cluster label per leaf. Labels are assigned in
    /// order of each cluster's smallest leaf index, so the numbering is
    /// deterministic for a given tree.
    pub fn cut(&self, height: f64) -> Vec<usize> {
        let total = self.num_leaves + self.merges.len();
        let mut parent: Vec<usize> = (0..total).collect();

        fn find(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }

        for (t, merge) in self.merges.iter().enumerate() {
            if merge.height > height {
                break;
            }
            let id = self.num_leaves + t;
            let left = find(&mut parent, merge.left);
            let right = find(&mut parent, merge.right);
            parent[left] = id;
            parent[right] = id;
        }

        let mut labels = vec![0; self.num_leaves];
        let mut next_label = 0;
        let mut label_of_root = std::collections::HashMap::new();
        for leaf in 0..self.num_leaves {
            let root = find(&mut parent, leaf);
            let label = *label_of_root.entry(root).or_insert_with(|| {
                let label = next_label;
                next_label += 1;
                label
            });
            labels[leaf] = label;
        }
        labels
    }
}

/// Agglomerative clustering with average (UPGMA) linkage.
///
/// Naive O(n³) pairwise scan with Lance-Williams updates; the attribute
/// counts clustered here are small. At equal distances the lexicographically
/// smallest active pair merges first.
pub fn average_linkage(distances: &Array2<f64>) -> Dendrogram {
    let n = distances.nrows();
    debug_assert_eq!(n, distances.ncols());

    if n == 0 {
        return Dendrogram { num_leaves: 0, merges: Vec::new() };
    }

    // Working distance matrix between active slots. Slot i initially holds
    // leaf i; after a merge the lower slot holds the merged cluster.
    let mut work = distances.to_owned();
    let mut active = vec![true; n];
    let mut cluster_id: Vec<usize> = (0..n).collect();
    let mut cluster_size: Vec<usize> = vec![1; n];

    let mut merges = Vec::with_capacity(n.saturating_sub(1));

    for step in 0..n.saturating_sub(1) {
        // Closest active pair, lexicographic tie-break.
        let mut best: Option<(usize, usize, f64)> = None;
        for i in 0..n {
            if !active[i] {
                continue;
            }
            for j in (i + 1)..n {
                if !active[j] {
                    continue;
                }
                let d = work[[i, j]];
                if best.map_or(true, |(_, _, current)| d < current) {
                    best = Some((i, j, d));
                }
            }
        }
        let Some((i, j, height)) = best else {
            break;
        };

        let merged_size = cluster_size[i] + cluster_size[j];
        merges.push(Merge {
            left: cluster_id[i],
            right: cluster_id[j],
            height,
            size: merged_size,
        });

        // Lance-Williams update for average linkage.
        let weight_i = cluster_size[i] as f64;
        let weight_j = cluster_size[j] as f64;
        for k in 0..n {
            if !active[k] || k == i || k == j {
                continue;
            }
            let updated = (weight_i * work[[i.min(k), i.max(k)]]
                + weight_j * work[[j.min(k), j.max(k)]])
                / (weight_i + weight_j);
            // Only the upper triangle is ever read.
            work[[i.min(k), i.max(k)]] = updated;
        }

        active[j] = false;
        cluster_id[i] = n + step;
        cluster_size[i] = merged_size;
    }

    Dendrogram { num_leaves: n, merges }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn symmetric(values: &[&[f64]]) -> Array2<f64> {
        let n = values.len();
        let mut matrix = Array2::zeros((n, n));
        for i in 0..n {
            for j in 0..n {
                matrix[[i, j]] = values[i][j];
            }
        }
        matrix
    }

    #[test]
    fn test_two_leaves() {
        let distances = arr2(&[[0.0, 0.4], [0.4, 0.0]]);
        let dendrogram = average_linkage(&distances);

        assert_eq!(dendrogram.merges().len(), 1);
        assert_eq!(dendrogram.merges()[0].height, 0.4);
        assert_eq!(dendrogram.merges()[0].size, 2);
        assert_eq!(dendrogram.max_height(), 0.4);
    }

    #[test]
    fn test_average_linkage_heights() {
        // Leaves 0 and 1 are close; 2 sits at distance 2.0 from 0 and 3.0
        // from 1, so the second merge happens at the average 2.5.
        let distances = symmetric(&[
            &[0.0, 1.0, 2.0],
            &[1.0, 0.0, 3.0],
            &[2.0, 3.0, 0.0],
        ]);
        let dendrogram = average_linkage(&distances);

        assert_eq!(dendrogram.merges().len(), 2);
        assert_eq!(dendrogram.merges()[0].height, 1.0);
        assert_eq!(dendrogram.merges()[0].left, 0);
        assert_eq!(dendrogram.merges()[0].right, 1);
        assert!((dendrogram.merges()[1].height - 2.5).abs() < 1e-12);
        // Second merge joins the new cluster (id 3) with leaf 2; the merged
        // cluster occupies the lower slot, so it appears as the left child.
        assert_eq!(dendrogram.merges()[1].left, 3);
        assert_eq!(dendrogram.merges()[1].right, 2);
    }

    #[test]
    fn test_heights_non_decreasing() {
        let distances = symmetric(&[
            &[0.0, 0.9, 0.2, 0.8],
            &[0.9, 0.0, 0.7, 0.1],
            &[0.2, 0.7, 0.0, 0.6],
            &[0.8, 0.1, 0.6, 0.0],
        ]);
        let dendrogram = average_linkage(&distances);

        let heights: Vec<f64> = dendrogram.merges().iter().map(|m| m.height).collect();
        for pair in heights.windows(2) {
            assert!(pair[0] <= pair[1], "heights {:?} not monotone", heights);
        }
    }

    #[test]
    fn test_cut_uses_distance_criterion() {
        // Two tight pairs far apart: cut between pair height and bridge
        // height must give exactly two clusters regardless of their sizes.
        let distances = symmetric(&[
            &[0.0, 0.1, 1.0, 1.0],
            &[0.1, 0.0, 1.0, 1.0],
            &[1.0, 1.0, 0.0, 0.1],
            &[1.0, 1.0, 0.1, 0.0],
        ]);
        let dendrogram = average_linkage(&distances);

        let labels = dendrogram.cut(0.5);
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[2], labels[3]);
        assert_ne!(labels[0], labels[2]);
        // Labels follow smallest-leaf order.
        assert_eq!(labels[0], 0);
        assert_eq!(labels[2], 1);

        // Cut above everything: one cluster.
        let labels = dendrogram.cut(dendrogram.max_height());
        assert!(labels.iter().all(|&l| l == 0));

        // Cut below everything: singletons.
        let labels = dendrogram.cut(0.05);
        assert_eq!(labels, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_single_leaf() {
        let distances = Array2::zeros((1, 1));
        let dendrogram = average_linkage(&distances);
        assert_eq!(dendrogram.merges().len(), 0);
        assert_eq!(dendrogram.max_height(), 0.0);
        assert_eq!(dendrogram.cut(1.0), vec![0]);
    }

    #[test]
    fn test_tie_break_is_lexicographic() {
        // All pairwise distances equal: the first merge must take (0, 1).
        let distances = symmetric(&[
            &[0.0, 0.5, 0.5],
            &[0.5, 0.0, 0.5],
            &[0.5, 0.5, 0.0],
        ]);
        let dendrogram = average_linkage(&distances);
        assert_eq!(dendrogram.merges()[0].left, 0);
        assert_eq!(dendrogram.merges()[0].right, 1);
    }
}
