//! Memoizing feasibility oracle.
//!
//! One oracle per method. Every "could this range leave the method, and what
//! would it cost?" question funnels through [`RefactoringOracle::get_metrics`],
//! which probes the source model exactly once per offset pair and serves
//! defensive copies afterwards. Per-solution adjustments made by the
//! evaluator therefore never corrupt the cached entries.

pub mod persistence;

use crate::candidates::Sequence;
use crate::complexity::Annotations;
use crate::core::metrics::ExtractionMetrics;
use crate::core::offsets::OffsetPair;
use crate::core::tree::MethodTree;
use crate::errors::{Error, Result};
use crate::search::runs::{ConsecutiveRuns, RunOrder};
use crate::source_model::SourceModel;
use im::HashMap;
use std::fmt;

/// Hit and miss counters for one oracle's lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries, {} hits, {} misses ({:.1}% hit rate)",
            self.entries,
            self.hits,
            self.misses,
            self.hit_rate() * 100.0
        )
    }
}

pub struct RefactoringOracle<'a, M: SourceModel> {
    model: &'a mut M,
    tree: &'a MethodTree,
    notes: &'a Annotations,
    cache: HashMap<OffsetPair, ExtractionMetrics>,
    hits: usize,
    misses: usize,
}

impl<'a, M: SourceModel> RefactoringOracle<'a, M> {
    pub fn new(model: &'a mut M, tree: &'a MethodTree, notes: &'a Annotations) -> Self {
        Self {
            model,
            tree,
            notes,
            cache: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// The borrow lives for `'a`, not `&self`, so callers can hold it across
    /// cache-mutating probes.
    pub fn tree(&self) -> &'a MethodTree {
        self.tree
    }

    pub fn notes(&self) -> &'a Annotations {
        self.notes
    }

    /// Metrics for extracting `seq`, computing and caching on first ask.
    /// Callers own the returned copy.
    pub fn get_metrics(&mut self, seq: &Sequence) -> ExtractionMetrics {
        let pair = seq.offsets(self.tree);
        if let Some(cached) = self.cache.get(&pair) {
            self.hits += 1;
            return cached.clone();
        }
        self.misses += 1;
        let metrics = self.compute(seq, pair);
        self.cache = self.cache.update(pair, metrics.clone());
        metrics
    }

    /// Quick feasibility check, cached like [`get_metrics`](Self::get_metrics).
    pub fn is_feasible(&mut self, seq: &Sequence) -> bool {
        self.get_metrics(seq).feasible
    }

    fn compute(&mut self, seq: &Sequence, pair: OffsetPair) -> ExtractionMetrics {
        let mut metrics = self.model.check_extract(self.tree.source(), pair);
        if !metrics.feasible {
            log::debug!("extraction {} infeasible: {}", pair, metrics.reason);
            // recorded, never retried within this analysis
            return metrics;
        }
        let agg = seq.aggregate(self.notes);
        metrics.reduction_of_cc = agg.reduction_of_cc() as i64;
        metrics.inherent_component = agg.inherent_component() as i64;
        metrics.nesting_component = agg.nesting_component() as i64;
        metrics.contributor_count = agg.contributor_count as i64;
        metrics.nesting = agg.nesting as i64;
        metrics
    }

    /// Eagerly probe every consecutive sub-run of every candidate block, so
    /// the graph stage sees the complete feasible universe.
    pub fn prefill(&mut self, candidates: &[Sequence]) {
        for block in candidates {
            for (from, to) in ConsecutiveRuns::new(block, self.notes, RunOrder::LongestFirst) {
                let run = block.subrun(from, to);
                self.get_metrics(&run);
            }
        }
        log::debug!("oracle prefilled: {}", self.stats());
    }

    /// Every cached pair that came back feasible, ordered by offsets.
    pub fn feasible_entries(&self) -> Vec<(OffsetPair, ExtractionMetrics)> {
        let mut entries: Vec<_> = self
            .cache
            .iter()
            .filter(|(_, m)| m.feasible)
            .map(|(p, m)| (*p, m.clone()))
            .collect();
        entries.sort_by_key(|(p, _)| *p);
        entries
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.cache.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Install externally computed rows, e.g. from a CSV import. Existing
    /// entries win: a fresh probe beats a stale table. Rows pointing outside
    /// this method's source are rejected outright.
    pub fn absorb(&mut self, rows: Vec<(OffsetPair, ExtractionMetrics)>) -> Result<()> {
        let end = self.tree.source().len() as u32;
        for (pair, metrics) in rows {
            if pair.b > end {
                return Err(Error::model(format!(
                    "cached pair {} lies outside the {}-byte source",
                    pair, end
                )));
            }
            if !self.cache.contains_key(&pair) {
                self.cache = self.cache.update(pair, metrics);
            }
        }
        Ok(())
    }

    pub fn export_rows(&self) -> Vec<(OffsetPair, ExtractionMetrics)> {
        let mut rows: Vec<_> = self.cache.iter().map(|(p, m)| (*p, m.clone())).collect();
        rows.sort_by_key(|(p, _)| *p);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::select_candidates;
    use crate::complexity::annotate;
    use crate::source_model::JavaSourceModel;
    use indoc::indoc;

    const SOURCE: &str = indoc! {"
        class Sample {
            void work(int n) {
                int acc = 0;
                if (n > 0) {
                    acc = n * 2;
                }
                System.out.println(acc);
            }
        }
    "};

    fn setup() -> (JavaSourceModel, MethodTree) {
        let mut model = JavaSourceModel::new().unwrap();
        let tree = model.parse_all(SOURCE).unwrap().remove(0);
        (model, tree)
    }

    #[test]
    fn test_get_metrics_is_idempotent_and_cache_stays_flat() {
        let (mut model, tree) = setup();
        let notes = annotate(&tree);
        let mut oracle = RefactoringOracle::new(&mut model, &tree, &notes);
        let candidates = select_candidates(&tree, &notes);
        let seq = &candidates[0];

        let first = oracle.get_metrics(seq);
        let size_after_first = oracle.len();
        let second = oracle.get_metrics(seq);

        assert_eq!(first, second);
        assert_eq!(oracle.len(), size_after_first);
        assert_eq!(oracle.stats().hits, 1);
        assert_eq!(oracle.stats().misses, 1);
    }

    #[test]
    fn test_metrics_carry_sequence_complexity() {
        let (mut model, tree) = setup();
        let notes = annotate(&tree);
        let mut oracle = RefactoringOracle::new(&mut model, &tree, &notes);
        let candidates = select_candidates(&tree, &notes);
        // the whole method body: one if at depth 0
        let metrics = oracle.get_metrics(&candidates[0]);
        assert!(metrics.feasible, "{}", metrics.reason);
        assert_eq!(metrics.reduction_of_cc, 1);
        assert_eq!(metrics.inherent_component, 1);
        assert_eq!(metrics.nesting_component, 0);
    }

    #[test]
    fn test_caller_copies_do_not_corrupt_the_cache() {
        let (mut model, tree) = setup();
        let notes = annotate(&tree);
        let mut oracle = RefactoringOracle::new(&mut model, &tree, &notes);
        let candidates = select_candidates(&tree, &notes);

        let mut copy = oracle.get_metrics(&candidates[0]);
        copy.reduction_of_cc -= 100;
        let fresh = oracle.get_metrics(&candidates[0]);
        assert_ne!(fresh.reduction_of_cc, copy.reduction_of_cc);
    }

    #[test]
    fn test_absorb_rejects_out_of_bounds_rows() {
        let (mut model, tree) = setup();
        let notes = annotate(&tree);
        let mut oracle = RefactoringOracle::new(&mut model, &tree, &notes);

        let past_end = SOURCE.len() as u32 + 10;
        let rows = vec![(
            OffsetPair::new(0, past_end),
            ExtractionMetrics::default(),
        )];
        let err = oracle.absorb(rows).unwrap_err();
        assert!(matches!(err, Error::Model(_)), "{}", err);
        assert!(oracle.is_empty());
    }

    #[test]
    fn test_tree_borrow_survives_cache_mutation() {
        let (mut model, tree) = setup();
        let notes = annotate(&tree);
        let mut oracle = RefactoringOracle::new(&mut model, &tree, &notes);
        let candidates = select_candidates(&tree, &notes);

        let held = oracle.tree();
        let held_notes = oracle.notes();
        oracle.get_metrics(&candidates[0]);
        assert_eq!(held.method_name(), "work");
        assert_eq!(held_notes.method_complexity(), 1);
    }

    #[test]
    fn test_prefill_probes_all_runs() {
        let (mut model, tree) = setup();
        let notes = annotate(&tree);
        let mut oracle = RefactoringOracle::new(&mut model, &tree, &notes);
        let candidates = select_candidates(&tree, &notes);
        oracle.prefill(&candidates);
        assert!(!oracle.is_empty());
        assert!(!oracle.feasible_entries().is_empty());
    }
}
