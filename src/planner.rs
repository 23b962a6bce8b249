//! Per-method planning pipeline and the batch entry point.
//!
//! One method flows annotate -> select -> oracle -> search -> solution. A
//! source file with several methods is planned in parallel, one tree-sitter
//! model per worker since parsers are not shareable; a method that fails to
//! plan becomes an error-carrying report instead of aborting the batch.

use crate::apply::{apply_solution, AppliedSolution};
use crate::candidates::select_candidates;
use crate::complexity::annotate;
use crate::core::metrics::ExtractionMetricsStats;
use crate::core::tree::MethodTree;
use crate::errors::{Error, Result};
use crate::oracle::RefactoringOracle;
use crate::search::{ExhaustiveEngine, IlpEngine, RunOrder, SearchOutcome};
use crate::solution::Evaluator;
use crate::source_model::{JavaSourceModel, SourceModel};
use clap::ValueEnum;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Which search strategy plans a method.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum EngineKind {
    Exhaustive,
    #[default]
    Ilp,
    /// Run both engines and keep the better solution.
    Both,
}

#[derive(Clone, Copy, Debug)]
pub struct Planner {
    pub threshold: u32,
    pub engine: EngineKind,
    pub max_evaluations: u64,
    pub node_limit: u64,
    pub order: RunOrder,
}

impl Default for Planner {
    fn default() -> Self {
        Self {
            threshold: 15,
            engine: EngineKind::default(),
            max_evaluations: 100_000,
            node_limit: 1_000_000,
            order: RunOrder::LongestFirst,
        }
    }
}

/// The outcome for one method plus its serializable summary.
#[derive(Debug)]
pub struct MethodPlan {
    pub outcome: SearchOutcome,
    pub report: MethodReport,
}

/// One extraction of a chosen solution, flattened for output.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub start: u32,
    pub end: u32,
    pub reduction_of_cc: i64,
    pub extracted_method_cc: i64,
    pub extracted_loc: u32,
    pub param_count: u32,
}

/// Serializable per-method planning summary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MethodReport {
    pub method: String,
    pub complexity: u32,
    pub threshold: u32,
    pub candidate_blocks: usize,
    pub feasible: bool,
    pub certified: bool,
    pub extraction_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fitness: Option<f64>,
    pub reduced_complexity: i64,
    pub residual_complexity: i64,
    pub extractions: Vec<ExtractionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<ExtractionMetricsStats>,
    pub cache_entries: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MethodReport {
    pub fn failed(method: &str, error: &Error) -> Self {
        Self {
            method: method.to_string(),
            complexity: 0,
            threshold: 0,
            candidate_blocks: 0,
            feasible: false,
            certified: false,
            extraction_count: 0,
            fitness: None,
            reduced_complexity: 0,
            residual_complexity: 0,
            extractions: Vec::new(),
            stats: None,
            cache_entries: 0,
            cache_hits: 0,
            cache_misses: 0,
            error: Some(error.to_string()),
        }
    }

    pub fn over_threshold(&self) -> bool {
        self.residual_complexity > self.threshold as i64
    }
}

impl Planner {
    /// Plan one method end to end.
    pub fn plan_method<M: SourceModel>(
        &self,
        model: &mut M,
        tree: &MethodTree,
    ) -> Result<MethodPlan> {
        let notes = annotate(tree);
        let complexity = notes.method_complexity();
        let candidates = select_candidates(tree, &notes);
        log::debug!(
            "planning {}: CC {}, {} candidate blocks, threshold {}",
            tree.method_name(),
            complexity,
            candidates.len(),
            self.threshold
        );

        let mut oracle = RefactoringOracle::new(model, tree, &notes);
        let evaluator = Evaluator::new(tree, &notes, self.threshold);
        let exhaustive = ExhaustiveEngine {
            max_evaluations: self.max_evaluations,
            order: self.order,
        };
        let mut ilp = IlpEngine::new(self.threshold);
        ilp.node_limit = self.node_limit;
        ilp.order = self.order;

        let outcome = match self.engine {
            EngineKind::Exhaustive => exhaustive.search(&mut oracle, &evaluator, &candidates),
            EngineKind::Ilp => ilp.search(&mut oracle, &evaluator, &candidates)?,
            EngineKind::Both => {
                let backtracked = exhaustive.search(&mut oracle, &evaluator, &candidates);
                match ilp.search(&mut oracle, &evaluator, &candidates) {
                    Ok(linear) => better_outcome(linear, backtracked),
                    Err(e) => {
                        log::warn!("ilp engine failed, keeping exhaustive result: {}", e);
                        backtracked
                    }
                }
            }
        };

        // per-range detail for the report; these are all cache hits
        let extractions: Vec<ExtractionReport> = outcome
            .solution()
            .map(|s| {
                s.sequences()
                    .map(|seq| {
                        let pair = seq.offsets(tree);
                        let m = oracle.get_metrics(seq);
                        ExtractionReport {
                            start: pair.a,
                            end: pair.b,
                            reduction_of_cc: m.reduction_of_cc,
                            extracted_method_cc: m.extracted_method_cc(),
                            extracted_loc: m.extracted_loc,
                            param_count: m.param_count,
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        let stats = oracle.stats();
        let report = self.report(
            tree.method_name(),
            complexity,
            candidates.len(),
            &outcome,
            extractions,
            stats,
        );
        Ok(MethodPlan { outcome, report })
    }

    /// Plan and apply in one step.
    pub fn refactor_method<M: SourceModel>(
        &self,
        model: &mut M,
        tree: &MethodTree,
    ) -> Result<(MethodPlan, AppliedSolution)> {
        let plan = self.plan_method(model, tree)?;
        let solution = plan.outcome.solution().ok_or_else(|| {
            Error::model(format!(
                "no feasible extraction set for {}",
                tree.method_name()
            ))
        })?;
        let applied = apply_solution(model, tree, solution)?;
        Ok((plan, applied))
    }

    /// Plan every method of a source file, in parallel. Failures turn into
    /// error-carrying reports; the batch always completes.
    pub fn plan_source(&self, source: &str) -> Result<Vec<MethodReport>> {
        let mut model = JavaSourceModel::new()?;
        let trees = model.parse_all(source)?;
        let reports = trees
            .par_iter()
            .map(|tree| match JavaSourceModel::new() {
                Ok(mut worker) => self
                    .plan_method(&mut worker, tree)
                    .map(|plan| plan.report)
                    .unwrap_or_else(|e| MethodReport::failed(tree.method_name(), &e)),
                Err(e) => MethodReport::failed(tree.method_name(), &e),
            })
            .collect();
        Ok(reports)
    }

    fn report(
        &self,
        method: &str,
        complexity: u32,
        candidate_blocks: usize,
        outcome: &SearchOutcome,
        extractions: Vec<ExtractionReport>,
        cache: crate::oracle::CacheStats,
    ) -> MethodReport {
        let solution = outcome.solution();
        let (feasible, fitness, reduced, stats) = match solution {
            Some(s) => (s.feasible, Some(s.fitness), s.reduced_complexity, Some(s.stats)),
            None => (false, None, 0, None),
        };

        MethodReport {
            method: method.to_string(),
            complexity,
            threshold: self.threshold,
            candidate_blocks,
            feasible,
            certified: outcome.is_certified(),
            extraction_count: solution.map(|s| s.len()).unwrap_or(0),
            fitness,
            reduced_complexity: reduced,
            residual_complexity: complexity as i64 - reduced,
            extractions,
            stats,
            cache_entries: cache.entries,
            cache_hits: cache.hits,
            cache_misses: cache.misses,
            error: None,
        }
    }
}

/// Lower fitness wins; on a tie the certified outcome does.
fn better_outcome(a: SearchOutcome, b: SearchOutcome) -> SearchOutcome {
    match (a.solution(), b.solution()) {
        (Some(x), Some(y)) => {
            if y.beats(x) || (!a.is_certified() && b.is_certified() && !x.beats(y)) {
                b
            } else {
                a
            }
        }
        (Some(_), None) => a,
        (None, _) => b,
    }
}
