//! Exhaustive backtracking enumeration.
//!
//! One slot per candidate block; each slot offers that block's feasible
//! consecutive runs plus "extract nothing". The driver walks the cross
//! product with an explicit index stack, pruning a branch the moment a
//! chosen run overlap-conflicts with an earlier choice, and hands every
//! complete combination to the evaluator. The running best by fitness wins.

use crate::candidates::Sequence;
use crate::core::offsets::OffsetPair;
use crate::core::tree::MethodTree;
use crate::oracle::RefactoringOracle;
use crate::search::runs::{ConsecutiveRuns, RunOrder};
use crate::search::SearchOutcome;
use crate::solution::{Evaluator, Solution};
use crate::source_model::SourceModel;

#[derive(Clone, Copy, Debug)]
pub struct ExhaustiveEngine {
    pub max_evaluations: u64,
    pub order: RunOrder,
}

impl Default for ExhaustiveEngine {
    fn default() -> Self {
        Self {
            max_evaluations: 100_000,
            order: RunOrder::LongestFirst,
        }
    }
}

impl ExhaustiveEngine {
    pub fn search<M: SourceModel>(
        &self,
        oracle: &mut RefactoringOracle<'_, M>,
        evaluator: &Evaluator<'_>,
        candidates: &[Sequence],
    ) -> SearchOutcome {
        let tree = oracle.tree();
        let options = self.block_options(oracle, candidates);
        let slot_sizes: Vec<usize> = options.iter().map(|o| o.len()).collect();
        log::debug!(
            "exhaustive search over {} blocks, runs per block: {:?}",
            options.len(),
            slot_sizes
        );

        let mut best: Option<Solution> = None;
        let mut evaluations: u64 = 0;
        let mut budget_hit = false;

        let mut driver = Driver::new(&options, tree);
        while let Some(chosen) = driver.next_combination() {
            let solution = evaluator.evaluate(oracle, &chosen);
            evaluations += 1;
            if best.as_ref().map_or(true, |b| solution.beats(b)) {
                best = Some(solution);
            }
            // a feasible single extraction with no penalties cannot be
            // beaten: the zero-extraction baseline was evaluated first
            if best.as_ref().is_some_and(|b| b.feasible && b.fitness <= 1.0) {
                log::debug!("early stop after {} evaluations", evaluations);
                break;
            }
            if evaluations >= self.max_evaluations {
                log::debug!("evaluation budget of {} hit", self.max_evaluations);
                budget_hit = true;
                break;
            }
        }

        match best {
            Some(solution) if budget_hit => SearchOutcome::Budgeted(solution),
            Some(solution) => SearchOutcome::Optimal(solution),
            None => SearchOutcome::NoneFeasible,
        }
    }

    /// The feasible runs of each block, in traversal order. Blocks with no
    /// feasible run contribute nothing to the cross product.
    fn block_options<M: SourceModel>(
        &self,
        oracle: &mut RefactoringOracle<'_, M>,
        candidates: &[Sequence],
    ) -> Vec<Vec<Sequence>> {
        let mut options = Vec::new();
        for block in candidates {
            let mut runs = Vec::new();
            for (from, to) in ConsecutiveRuns::new(block, oracle.notes(), self.order) {
                let run = block.subrun(from, to);
                if oracle.is_feasible(&run) {
                    runs.push(run);
                }
            }
            if !runs.is_empty() {
                options.push(runs);
            }
        }
        options
    }
}

/// N-ary backtracking over one choice per slot, as an explicit index-stack
/// state machine. Choice 0 means "skip this slot" and is tried first, so the
/// zero-extraction baseline is the first complete combination; choice `k`
/// picks run `k - 1`.
struct Driver<'a> {
    options: &'a [Vec<Sequence>],
    tree: &'a MethodTree,
    /// chosen option index per filled slot
    picks: Vec<usize>,
    /// offsets of the non-skip choices among the filled slots
    chosen: Vec<(usize, OffsetPair)>,
    /// next option to try at the current depth
    next: usize,
    done: bool,
}

impl<'a> Driver<'a> {
    fn new(options: &'a [Vec<Sequence>], tree: &'a MethodTree) -> Self {
        Self {
            options,
            tree,
            picks: Vec::with_capacity(options.len()),
            chosen: Vec::new(),
            next: 0,
            done: false,
        }
    }

    /// Advance to the next complete, conflict-free combination.
    fn next_combination(&mut self) -> Option<Vec<Sequence>> {
        if self.done {
            return None;
        }
        loop {
            let depth = self.picks.len();
            if depth == self.options.len() {
                let combination = self.current();
                self.backtrack();
                return Some(combination);
            }
            let slot = &self.options[depth];
            if self.next > slot.len() {
                if !self.backtrack() {
                    return None;
                }
                continue;
            }
            if self.next == 0 {
                self.picks.push(0);
                self.next = 0;
                continue;
            }
            let pair = slot[self.next - 1].offsets(self.tree);
            if self.conflicts_with_chosen(pair) {
                self.next += 1;
                continue;
            }
            self.chosen.push((depth, pair));
            self.picks.push(self.next);
            self.next = 0;
        }
    }

    /// Overlap is a conflict; containment and disjointness are fine.
    fn conflicts_with_chosen(&self, pair: OffsetPair) -> bool {
        self.chosen.iter().any(|(_, p)| p.overlaps(&pair))
    }

    fn current(&self) -> Vec<Sequence> {
        self.picks
            .iter()
            .enumerate()
            .filter(|(_, &pick)| pick > 0)
            .map(|(slot, &pick)| self.options[slot][pick - 1].clone())
            .collect()
    }

    fn backtrack(&mut self) -> bool {
        loop {
            match self.picks.pop() {
                None => {
                    self.done = true;
                    return false;
                }
                Some(pick) => {
                    let depth = self.picks.len();
                    if self.chosen.last().map(|(s, _)| *s) == Some(depth) {
                        self.chosen.pop();
                    }
                    if pick == self.options[depth].len() {
                        // every choice for this slot has been tried
                        continue;
                    }
                    self.next = pick + 1;
                    return true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::select_candidates;
    use crate::complexity::annotate;
    use crate::source_model::JavaSourceModel;
    use indoc::indoc;

    const TWO_IFS: &str = indoc! {"
        class Sample {
            void handle(int a, int b) {
                if (a > 0) {
                    System.out.println(a);
                }
                if (b > 0) {
                    System.out.println(b);
                }
            }
        }
    "};

    fn run_search(source: &str, threshold: u32, max_evaluations: u64) -> SearchOutcome {
        let mut model = JavaSourceModel::new().unwrap();
        let tree = model.parse_all(source).unwrap().remove(0);
        let notes = annotate(&tree);
        let candidates = select_candidates(&tree, &notes);
        let mut oracle = RefactoringOracle::new(&mut model, &tree, &notes);
        let evaluator = Evaluator::new(&tree, &notes, threshold);
        let engine = ExhaustiveEngine {
            max_evaluations,
            order: RunOrder::LongestFirst,
        };
        engine.search(&mut oracle, &evaluator, &candidates)
    }

    #[test]
    fn test_under_threshold_method_needs_no_extraction() {
        // CC = 2, threshold 10: the empty solution is optimal
        let outcome = run_search(TWO_IFS, 10, 1_000);
        let solution = outcome.solution().expect("solution");
        assert!(outcome.is_certified());
        assert_eq!(solution.len(), 0);
        assert!((solution.fitness - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_over_threshold_method_extracts_something() {
        let outcome = run_search(TWO_IFS, 1, 10_000);
        let solution = outcome.solution().expect("solution");
        assert!(solution.feasible);
        assert!(solution.len() >= 1);
        // residual and every extracted method are within threshold 1, so
        // fitness is exactly the extraction count
        assert!((solution.fitness - solution.len() as f64).abs() < f64::EPSILON);
    }

    #[test]
    fn test_budget_of_one_reports_budgeted() {
        let outcome = run_search(TWO_IFS, 1, 1);
        assert!(!outcome.is_certified());
        assert!(outcome.solution().is_some());
    }

    #[test]
    fn test_driver_enumerates_full_cross_product() {
        let mut model = JavaSourceModel::new().unwrap();
        let tree = model.parse_all(TWO_IFS).unwrap().remove(0);
        // two singleton slots -> (1+1) * (1+1) combinations
        let notes = annotate(&tree);
        let candidates = select_candidates(&tree, &notes);
        let body = candidates[0].clone();
        let options = vec![
            vec![body.subrun(0, 0)],
            vec![body.subrun(1, 1)],
        ];
        let mut driver = Driver::new(&options, &tree);
        let mut count = 0;
        while driver.next_combination().is_some() {
            count += 1;
        }
        assert_eq!(count, 4);
    }
}
