//! Solutions and their fitness.
//!
//! A [`Solution`] is an ordered set of sequences chosen for extraction from
//! one method. The [`Evaluator`] turns a raw set into a scored solution,
//! re-deriving the complexity bookkeeping when one chosen extraction is
//! nested inside another: the inner range collapses to a single call, so its
//! contribution must come out of the outer range's recorded metrics or it
//! would be counted twice.

use crate::candidates::Sequence;
use crate::complexity::Annotations;
use crate::core::metrics::{ExtractionMetrics, ExtractionMetricsStats};
use crate::core::offsets::OffsetPair;
use crate::core::tree::MethodTree;
use crate::oracle::RefactoringOracle;
use crate::source_model::SourceModel;

/// Fitness penalty per unit of complexity still over the threshold, applied
/// to each extracted method and to the main method's residual.
pub const OVER_THRESHOLD_PENALTY: f64 = 10.0;

/// A chosen, ordered set of extractions for one method.
#[derive(Clone, Debug)]
pub struct Solution {
    /// ascending by start offset; at a shared start the outer range first
    sequences: Vec<(Sequence, OffsetPair)>,
    pub feasible: bool,
    /// lower is better; infeasible solutions score infinity
    pub fitness: f64,
    /// total CC the main method loses
    pub reduced_complexity: i64,
    /// joined per-extraction metrics
    pub metrics: ExtractionMetrics,
    pub stats: ExtractionMetricsStats,
}

impl Solution {
    pub fn sequences(&self) -> impl Iterator<Item = &Sequence> {
        self.sequences.iter().map(|(s, _)| s)
    }

    pub fn offset_pairs(&self) -> Vec<OffsetPair> {
        self.sequences.iter().map(|(_, p)| *p).collect()
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Strictly better than `other` by fitness.
    pub fn beats(&self, other: &Solution) -> bool {
        self.fitness < other.fitness
    }
}

pub struct Evaluator<'a> {
    tree: &'a MethodTree,
    notes: &'a Annotations,
    threshold: u32,
}

impl<'a> Evaluator<'a> {
    pub fn new(tree: &'a MethodTree, notes: &'a Annotations, threshold: u32) -> Self {
        Self {
            tree,
            notes,
            threshold,
        }
    }

    /// Score a set of sequences. Sequences are processed rightmost-first so
    /// that by the time an outer range is reached, every chosen range nested
    /// inside it has already been adjusted and can be subtracted.
    pub fn evaluate<M: SourceModel>(
        &self,
        oracle: &mut RefactoringOracle<'_, M>,
        seqs: &[Sequence],
    ) -> Solution {
        let mut ordered: Vec<(Sequence, OffsetPair)> = seqs
            .iter()
            .map(|s| (s.clone(), s.offsets(self.tree)))
            .collect();
        // at a shared start the outer range must sort first, so the reversed
        // walk below adjusts the inner range before reaching the outer
        ordered.sort_by_key(|(_, p)| (p.a, std::cmp::Reverse(p.b)));

        let mut adjusted: Vec<(OffsetPair, ExtractionMetrics)> = Vec::new();
        for (seq, pair) in ordered.iter().rev() {
            let mut m = oracle.get_metrics(seq);
            if !m.feasible {
                log::debug!("solution infeasible at {}: {}", pair, m.reason);
                return self.infeasible(ordered, m);
            }
            for (inner_pair, inner) in &adjusted {
                if pair.contains(inner_pair) {
                    m.reduction_of_cc -= inner.reduction_of_cc;
                    m.inherent_component -= inner.inherent_component;
                    m.contributor_count -= inner.contributor_count;
                    m.nesting_component -= inner.nesting_component
                        + inner.contributor_count * (inner.nesting - m.nesting);
                }
            }
            adjusted.push((*pair, m));
        }
        adjusted.reverse();

        let mut fitness = adjusted.len() as f64;
        for (_, m) in &adjusted {
            let excess = m.extracted_method_cc() - self.threshold as i64;
            if excess > 0 {
                fitness += OVER_THRESHOLD_PENALTY * excess as f64;
            }
        }
        let reduced: i64 = adjusted.iter().map(|(_, m)| m.reduction_of_cc).sum();
        let residual = self.notes.method_complexity() as i64 - reduced;
        let main_excess = residual - self.threshold as i64;
        if main_excess > 0 {
            fitness += OVER_THRESHOLD_PENALTY * main_excess as f64;
        }

        let metrics_list: Vec<ExtractionMetrics> =
            adjusted.iter().map(|(_, m)| m.clone()).collect();
        let joined = metrics_list
            .iter()
            .skip(1)
            .fold(metrics_list.first().cloned().unwrap_or_default(), |a, b| {
                a.join(b)
            });

        Solution {
            sequences: ordered,
            feasible: true,
            fitness,
            reduced_complexity: reduced,
            stats: ExtractionMetricsStats::from_metrics(&metrics_list),
            metrics: joined,
        }
    }

    fn infeasible(
        &self,
        sequences: Vec<(Sequence, OffsetPair)>,
        metrics: ExtractionMetrics,
    ) -> Solution {
        Solution {
            sequences,
            feasible: false,
            fitness: f64::INFINITY,
            reduced_complexity: 0,
            stats: ExtractionMetricsStats::default(),
            metrics,
        }
    }
}
