//! Per-neighborhood, per-attribute significance computation.
//!
//! Two algorithms, chosen by the value types in the attribute matrix:
//! an exact hypergeometric test for binary attributes and a permutation
//! (randomization) test for quantitative attributes. Both produce one or two
//! one-sided p-value matrices and a signed neighborhood enrichment score
//! (NES = -log10 p).

use crate::neighborhood::NeighborhoodMatrix;
use ndarray::{Array2, Axis, Zip};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use safe_core::{AttributeMatrix, AttributeSign, EnrichmentConfig, EnrichmentMode, Result, SafeError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Observer for the permutation hot loop.
///
/// Called once per completed permutation iteration; returning `false`
/// requests cooperative cancellation. Implementations must be `Sync` because
/// iterations run on worker threads.
pub trait ProgressSink: Sync {
    fn on_permutation(&self, completed: usize, total: usize) -> bool {
        let _ = (completed, total);
        true
    }
}

/// Sink that never reports and never cancels.
pub struct NullProgress;

impl ProgressSink for NullProgress {}

/// Which significance test actually ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentMethod {
    Hypergeometric,
    Permutation,
}

/// Output of the enrichment stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentResult {
    /// Test that was selected
    pub method: EnrichmentMethod,

    /// Positive-tail p-values (enrichment of presence / high values)
    pub pvalues_pos: Array2<f64>,

    /// Negative-tail p-values (permutation path only)
    pub pvalues_neg: Option<Array2<f64>>,

    /// Signed neighborhood enrichment scores
    pub nes: Array2<f64>,

    /// Binary significance indicator (NES above the threshold cutoff)
    pub nes_binary: Array2<u8>,

    /// Enrichment breadth per attribute: number of enriched neighborhoods
    pub num_enriched_neighborhoods: Vec<usize>,
}

/// Computes p-values and NES for every (neighborhood, attribute) pair.
pub struct EnrichmentEngine {
    config: EnrichmentConfig,
}

impl EnrichmentEngine {
    pub fn new(config: EnrichmentConfig) -> Self {
        Self { config }
    }

    /// Runs the test selected by the configuration and the attribute types.
    pub fn compute(
        &self,
        neighborhoods: &NeighborhoodMatrix,
        attributes: &AttributeMatrix,
        progress: &dyn ProgressSink,
    ) -> Result<EnrichmentResult> {
        if neighborhoods.num_nodes() != attributes.num_nodes() {
            return Err(SafeError::validation(format!(
                "neighborhood matrix has {} nodes, attribute matrix has {}",
                neighborhoods.num_nodes(),
                attributes.num_nodes()
            )));
        }

        let force_permutation = self.config.mode == EnrichmentMode::Randomization;
        let (method, pvalues_pos, pvalues_neg, nes) = if !force_permutation && attributes.is_binary()
        {
            log::info!("attribute values are binary; using the hypergeometric test");
            let (pvalues, nes) = self.compute_by_hypergeom(neighborhoods, attributes);
            (EnrichmentMethod::Hypergeometric, pvalues, None, nes)
        } else {
            log::info!(
                "attribute values are quantitative{}; using randomization ({} permutations)",
                if force_permutation { " or randomization was forced" } else { "" },
                self.config.num_permutations
            );
            let (pvalues_pos, pvalues_neg, nes) =
                self.compute_by_randomization(neighborhoods, attributes, progress)?;
            (EnrichmentMethod::Permutation, pvalues_pos, Some(pvalues_neg), nes)
        };

        let cutoff = self.config.nes_cutoff();
        let nes_binary = nes.mapv(|v| u8::from(v > cutoff));
        let num_enriched_neighborhoods = nes_binary
            .axis_iter(Axis(1))
            .map(|column| column.iter().map(|&v| v as usize).sum())
            .collect();

        Ok(EnrichmentResult {
            method,
            pvalues_pos,
            pvalues_neg,
            nes,
            nes_binary,
            num_enriched_neighborhoods,
        })
    }

    /// Exact upper-tail hypergeometric test for binary attributes.
    ///
    /// Population = all N nodes, successes = nodes carrying the attribute,
    /// draws = the neighborhood. Bonferroni-corrected across attributes when
    /// configured, with the product clamped back into [0, 1].
    fn compute_by_hypergeom(
        &self,
        neighborhoods: &NeighborhoodMatrix,
        attributes: &AttributeMatrix,
    ) -> (Array2<f64>, Array2<f64>) {
        let num_nodes = attributes.num_nodes();
        let num_attributes = attributes.num_attributes();

        let table = LnFactorial::up_to(num_nodes);

        // Successes per attribute: count of present 1-values in the column.
        let successes: Vec<usize> = attributes
            .values_or_zero()
            .axis_iter(Axis(1))
            .map(|column| column.sum().round() as usize)
            .collect();

        // Draws per node: neighborhood size.
        let draws = neighborhoods.sizes();

        // Observed co-occurrence: members of the neighborhood carrying the attribute.
        let observed = neighborhoods.membership().dot(attributes.values_or_zero());

        let mut pvalues = Array2::zeros((num_nodes, num_attributes));
        for i in 0..num_nodes {
            for j in 0..num_attributes {
                let k = observed[[i, j]].round() as usize;
                let mut p = table.survival(k, num_nodes, successes[j], draws[i]);
                if self.config.multiple_testing {
                    p = (p * num_attributes as f64).min(1.0);
                }
                pvalues[[i, j]] = p;
            }
        }

        let nes = pvalues.mapv(|p| -p.log10());
        (pvalues, nes)
    }

    /// Permutation test for quantitative attributes.
    ///
    /// The observed statistic is the standardized neighborhood score; the
    /// null distribution is generated by shuffling the data-bearing rows of
    /// the attribute matrix. Iteration t seeds its own ChaCha stream from
    /// `seed + t` and shuffles the original matrix, so counts are identical
    /// for a given seed regardless of thread count.
    fn compute_by_randomization(
        &self,
        neighborhoods: &NeighborhoodMatrix,
        attributes: &AttributeMatrix,
        progress: &dyn ProgressSink,
    ) -> Result<(Array2<f64>, Array2<f64>, Array2<f64>)> {
        let membership = neighborhoods.membership();
        let values = attributes.values_or_zero();
        let presence = attributes.presence_matrix();

        let observed = neighborhood_score(membership, values, &presence);

        let data_rows = attributes.rows_with_data();
        let total = self.config.num_permutations;
        let base_seed = self
            .config
            .seed
            .unwrap_or_else(|| rand::thread_rng().gen::<u64>());

        let shape = observed.raw_dim();
        let cancelled = AtomicBool::new(false);
        let completed = AtomicUsize::new(0);

        let (counts_neg, counts_pos) = (0..total)
            .into_par_iter()
            .fold(
                || (Array2::<f64>::zeros(shape), Array2::<f64>::zeros(shape)),
                |(mut neg, mut pos), iteration| {
                    if cancelled.load(Ordering::Relaxed) {
                        return (neg, pos);
                    }

                    let mut rng =
                        ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(iteration as u64));
                    let mut shuffled = data_rows.clone();
                    shuffled.shuffle(&mut rng);

                    // Rows without data keep their (empty) place; only
                    // data-bearing rows trade values and masks.
                    let mut values_perm = values.to_owned();
                    let mut presence_perm = presence.clone();
                    for (&destination, &source) in data_rows.iter().zip(shuffled.iter()) {
                        values_perm.row_mut(destination).assign(&values.row(source));
                        presence_perm
                            .row_mut(destination)
                            .assign(&presence.row(source));
                    }

                    let permuted = neighborhood_score(membership, &values_perm, &presence_perm);

                    Zip::from(&mut neg)
                        .and(&mut pos)
                        .and(&permuted)
                        .and(&observed)
                        .for_each(|neg, pos, &permuted, &observed| {
                            // NaN on either side compares false on both tails.
                            if permuted < observed {
                                *neg += 1.0;
                            }
                            if permuted > observed {
                                *pos += 1.0;
                            }
                        });

                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    if !progress.on_permutation(done, total) {
                        cancelled.store(true, Ordering::Relaxed);
                    }

                    (neg, pos)
                },
            )
            .reduce(
                || (Array2::<f64>::zeros(shape), Array2::<f64>::zeros(shape)),
                |(neg_a, pos_a), (neg_b, pos_b)| (neg_a + neg_b, pos_a + pos_b),
            );

        if cancelled.load(Ordering::Relaxed) {
            return Err(SafeError::Cancelled {
                completed: completed.load(Ordering::Relaxed),
                total,
            });
        }

        // Empirical p-values, floored at 1/total: a permutation test can
        // never report a probability below its own resolution. Cells whose
        // observed score is undefined (no data, zero variance) are
        // non-significant by construction.
        let floor = 1.0 / total as f64;
        let to_pvalue = |count: f64, observed: f64| -> f64 {
            if observed.is_finite() {
                (count / total as f64).max(floor)
            } else {
                1.0
            }
        };

        let mut pvalues_neg = Array2::zeros(shape);
        let mut pvalues_pos = Array2::zeros(shape);
        Zip::from(&mut pvalues_neg)
            .and(&mut pvalues_pos)
            .and(&counts_neg)
            .and(&counts_pos)
            .and(&observed)
            .for_each(|p_neg, p_pos, &c_neg, &c_pos, &obs| {
                *p_neg = to_pvalue(c_neg, obs);
                *p_pos = to_pvalue(c_pos, obs);
            });

        let nes_pos = pvalues_pos.mapv(|p| -p.log10());
        let nes_neg = pvalues_neg.mapv(|p| -p.log10());

        let nes = match self.config.sign {
            AttributeSign::Highest => nes_pos,
            AttributeSign::Lowest => nes_neg,
            AttributeSign::Both => nes_pos - nes_neg,
        };

        Ok((pvalues_pos, pvalues_neg, nes))
    }
}

/// Standardized per-neighborhood attribute score.
///
/// AB   = membership · values
/// N    = membership · presence
/// M    = AB / N
/// A2B2 = membership · values²
/// score = AB / sqrt(A2B2 − 2·M·AB + N·M²)
///
/// Any cell whose denominator is undefined (no data in the neighborhood, or
/// zero variance) is NaN; callers treat NaN as non-significant.
fn neighborhood_score(
    membership: &Array2<f64>,
    values: &Array2<f64>,
    presence: &Array2<f64>,
) -> Array2<f64> {
    let ab = membership.dot(values);
    let data_count = membership.dot(presence);
    let values_sq = values.mapv(|v| v * v);
    // membership entries are 0/1, so the element-squared matrix is itself
    let a2b2 = membership.dot(&values_sq);

    let mut score = Array2::zeros(ab.raw_dim());
    Zip::from(&mut score)
        .and(&ab)
        .and(&data_count)
        .and(&a2b2)
        .for_each(|score, &ab, &count, &a2b2| {
            if count <= 0.0 {
                *score = f64::NAN;
                return;
            }
            let mean = ab / count;
            let variance_term = a2b2 - 2.0 * mean * ab + count * mean * mean;
            if variance_term > 0.0 && variance_term.is_finite() {
                *score = ab / variance_term.sqrt();
            } else {
                *score = f64::NAN;
            }
        });
    score
}

/// Precomputed ln-factorials for exact hypergeometric tail sums.
struct LnFactorial {
    table: Vec<f64>,
}

impl LnFactorial {
    fn up_to(n: usize) -> Self {
        let mut table = vec![0.0; n + 1];
        for i in 1..=n {
            table[i] = table[i - 1] + (i as f64).ln();
        }
        Self { table }
    }

    fn ln_choose(&self, n: usize, k: usize) -> f64 {
        if k > n {
            return f64::NEG_INFINITY;
        }
        self.table[n] - self.table[k] - self.table[n - k]
    }

    /// P[X >= k] for X ~ Hypergeometric(population, successes, draws).
    fn survival(&self, k: usize, population: usize, successes: usize, draws: usize) -> f64 {
        let lower = (draws + successes).saturating_sub(population);
        let upper = draws.min(successes);
        if k <= lower {
            return 1.0;
        }
        if k > upper {
            return 0.0;
        }
        let ln_denominator = self.ln_choose(population, draws);
        let mut p = 0.0;
        for x in k..=upper {
            let ln_pmf = self.ln_choose(successes, x)
                + self.ln_choose(population - successes, draws - x)
                - ln_denominator;
            p += ln_pmf.exp();
        }
        p.clamp(0.0, 1.0)
    }
}
