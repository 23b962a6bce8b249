//! Integer-linear-program formulation of the extraction search.
//!
//! One binary variable per extraction-graph vertex says "extract this
//! range"; the method body is the root vertex and is always selected. For
//! every vertex pair where `d` is contained in `v`, an auxiliary variable
//! linearizes "d is extracted and no selected range sits between d and v",
//! which is exactly when d's complexity leaves v's residual. A big-M
//! constraint per vertex then caps every resulting method at the threshold,
//! overlapping ranges exclude each other, and the objective minimizes the
//! extraction count. Every optimum in the solver's pool is re-scored by the
//! evaluator and the best one wins.

use crate::candidates::Sequence;
use crate::complexity::Annotations;
use crate::core::offsets::OffsetPair;
use crate::core::tree::MethodTree;
use crate::errors::Result;
use crate::graph::{ExtractionGraph, ExtractionVertex};
use crate::oracle::RefactoringOracle;
use crate::search::runs::{ConsecutiveRuns, RunOrder};
use crate::search::solver::{LpSolver, PoolSolver, Relation, VarId};
use crate::search::SearchOutcome;
use crate::solution::{Evaluator, Solution};
use crate::source_model::SourceModel;
use petgraph::graph::NodeIndex;
use std::collections::{HashMap, HashSet};

#[derive(Clone, Copy, Debug)]
pub struct IlpEngine {
    pub threshold: u32,
    pub node_limit: u64,
    pub order: RunOrder,
}

impl IlpEngine {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            node_limit: 1_000_000,
            order: RunOrder::LongestFirst,
        }
    }

    pub fn search<M: SourceModel>(
        &self,
        oracle: &mut RefactoringOracle<'_, M>,
        evaluator: &Evaluator<'_>,
        candidates: &[Sequence],
    ) -> Result<SearchOutcome> {
        oracle.prefill(candidates);
        let root = root_vertex(oracle.tree(), oracle.notes());
        let graph = ExtractionGraph::build(&oracle.feasible_entries(), root)?;
        let runs = runs_by_offsets(oracle.tree(), oracle.notes(), candidates, self.order);

        let mut solver = PoolSolver::new().with_node_limit(self.node_limit);
        let encoding = self.encode(&mut solver, &graph);
        solver.solve()?;
        log::debug!(
            "ilp: {} vertices, {} optima in pool, certified: {}",
            graph.len(),
            solver.solution_pool_size(),
            solver.certified_optimal()
        );

        // pool entries can differ only in auxiliary variables; dedupe on the
        // selection vector before the expensive re-scoring
        let mut seen: HashSet<Vec<bool>> = HashSet::new();
        let mut best: Option<Solution> = None;
        for index in 0..solver.solution_pool_size() {
            let picks: Vec<bool> = encoding
                .x
                .iter()
                .map(|&var| solver.value_in_solution(var, index))
                .collect();
            if !seen.insert(picks.clone()) {
                continue;
            }
            let Some(seqs) = selected_sequences(&encoding, &graph, &runs, &picks) else {
                continue;
            };
            let solution = evaluator.evaluate(oracle, &seqs);
            if solution.feasible && best.as_ref().map_or(true, |b| solution.beats(b)) {
                best = Some(solution);
            }
        }

        Ok(match best {
            Some(solution) if solver.certified_optimal() => SearchOutcome::Optimal(solution),
            Some(solution) => SearchOutcome::Budgeted(solution),
            None => SearchOutcome::NoneFeasible,
        })
    }

    /// Build the 0-1 program over the extraction graph.
    fn encode<S: LpSolver>(&self, solver: &mut S, graph: &ExtractionGraph) -> Encoding {
        let vertices = graph.vertices();
        let slot_of: HashMap<NodeIndex, usize> = vertices
            .iter()
            .enumerate()
            .map(|(slot, (idx, _))| (*idx, slot))
            .collect();
        let x: Vec<VarId> = vertices.iter().map(|_| solver.new_bool_var()).collect();

        // the method body is not optional
        let root_slot = slot_of[&graph.root()];
        solver.add_linear_constraint(&[(x[root_slot], 1.0)], Relation::Eq, 1.0);

        // z[d][v] = 1 iff d is selected and no selected range lies strictly
        // between d and v in the containment order
        for (v_slot, (v_idx, v)) in vertices.iter().enumerate() {
            let mut residual_terms: Vec<(VarId, f64)> = Vec::new();
            for (d_slot, (d_idx, d)) in vertices.iter().enumerate() {
                if d_idx == v_idx || !graph.reaches(*d_idx, *v_idx) {
                    continue;
                }
                let between: Vec<usize> = vertices
                    .iter()
                    .enumerate()
                    .filter(|(_, (w_idx, _))| {
                        w_idx != d_idx
                            && w_idx != v_idx
                            && graph.reaches(*d_idx, *w_idx)
                            && graph.reaches(*w_idx, *v_idx)
                    })
                    .map(|(w_slot, _)| w_slot)
                    .collect();

                let z = solver.new_bool_var();
                solver.add_linear_constraint(&[(z, 1.0), (x[d_slot], -1.0)], Relation::Le, 0.0);
                for &w_slot in &between {
                    solver.add_linear_constraint(&[(z, 1.0), (x[w_slot], 1.0)], Relation::Le, 1.0);
                }
                let mut lower: Vec<(VarId, f64)> = vec![(x[d_slot], 1.0), (z, -1.0)];
                lower.extend(between.iter().map(|&w_slot| (x[w_slot], -1.0)));
                solver.add_linear_constraint(&lower, Relation::Le, 0.0);

                // what leaves v's residual when d is its innermost selected
                // descendant: d's reduction re-based to v's nesting depth
                let coefficient = (d.reduction_of_cc - d.contributor_count * v.nesting) as f64;
                residual_terms.push((z, coefficient));
            }

            // selecting v caps its post-extraction CC at the threshold
            let big_m = v.extracted_method_cc() as f64;
            let mut residual: Vec<(VarId, f64)> = vec![(x[v_slot], big_m)];
            residual.extend(residual_terms.iter().map(|&(z, c)| (z, -c)));
            let bound = self.threshold as f64 + big_m - v.extracted_method_cc() as f64;
            solver.add_linear_constraint(&residual, Relation::Le, bound);
        }

        for (p, q) in graph.conflicting_pairs() {
            let find = |pair: OffsetPair| {
                vertices
                    .iter()
                    .position(|(_, v)| v.offsets == pair)
                    .map(|slot| x[slot])
            };
            if let (Some(xp), Some(xq)) = (find(p), find(q)) {
                solver.add_linear_constraint(&[(xp, 1.0), (xq, 1.0)], Relation::Le, 1.0);
            }
        }

        let objective: Vec<(VarId, f64)> = x
            .iter()
            .enumerate()
            .filter(|(slot, _)| *slot != root_slot)
            .map(|(_, &var)| (var, 1.0))
            .collect();
        solver.minimize(&objective);

        Encoding {
            x,
            vertices,
            root_slot,
        }
    }
}

struct Encoding {
    x: Vec<VarId>,
    vertices: Vec<(NodeIndex, ExtractionVertex)>,
    root_slot: usize,
}

/// The whole method body as a graph vertex at nesting depth zero.
fn root_vertex(tree: &MethodTree, notes: &Annotations) -> ExtractionVertex {
    let offsets = tree
        .body_block()
        .map(|body| Sequence::new(tree.children(body).to_vec()).offsets(tree))
        .unwrap_or_else(|| tree.offsets(tree.root()));
    let cc = notes.method_complexity() as i64;
    ExtractionVertex {
        offsets,
        reduction_of_cc: cc,
        inherent_component: cc,
        nesting_component: 0,
        contributor_count: 0,
        nesting: 0,
    }
}

/// Every consecutive run of every candidate block, keyed by its offsets, so
/// solver selections map back onto sequences.
fn runs_by_offsets(
    tree: &MethodTree,
    notes: &Annotations,
    candidates: &[Sequence],
    order: RunOrder,
) -> HashMap<OffsetPair, Sequence> {
    let mut map = HashMap::new();
    for block in candidates {
        for (from, to) in ConsecutiveRuns::new(block, notes, order) {
            let run = block.subrun(from, to);
            map.insert(run.offsets(tree), run);
        }
    }
    map
}

/// The selected non-root vertices as sequences. `None` if a selected vertex
/// has no corresponding run, which means the selection cannot be realized.
fn selected_sequences(
    encoding: &Encoding,
    graph: &ExtractionGraph,
    runs: &HashMap<OffsetPair, Sequence>,
    picks: &[bool],
) -> Option<Vec<Sequence>> {
    let mut seqs = Vec::new();
    for (slot, (idx, vertex)) in encoding.vertices.iter().enumerate() {
        if slot == encoding.root_slot || *idx == graph.root() || !picks[slot] {
            continue;
        }
        seqs.push(runs.get(&vertex.offsets)?.clone());
    }
    Some(seqs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::select_candidates;
    use crate::complexity::annotate;
    use crate::search::ExhaustiveEngine;
    use crate::source_model::JavaSourceModel;
    use indoc::indoc;

    const NESTED: &str = indoc! {"
        class Sample {
            void process(int[] xs, boolean a, boolean b) {
                if (a && b) {
                    for (int x : xs) {
                        if (x > 0) {
                            System.out.println(x);
                        }
                    }
                }
            }
        }
    "};

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

    fn run_ilp(source: &str, threshold: u32) -> SearchOutcome {
        let mut model = JavaSourceModel::new().unwrap();
        let tree = model.parse_all(source).unwrap().remove(0);
        let notes = annotate(&tree);
        let candidates = select_candidates(&tree, &notes);
        let mut oracle = RefactoringOracle::new(&mut model, &tree, &notes);
        let evaluator = Evaluator::new(&tree, &notes, threshold);
        IlpEngine::new(threshold)
            .search(&mut oracle, &evaluator, &candidates)
            .unwrap()
    }

    #[test]
    fn test_under_threshold_selects_nothing() {
        let outcome = run_ilp(TWO_IFS, 10);
        let solution = outcome.solution().expect("solution");
        assert!(outcome.is_certified());
        assert_eq!(solution.len(), 0);
    }

    #[test]
    fn test_over_threshold_extracts_minimally() {
        // method CC is 7; one extraction can carry it all out
        let outcome = run_ilp(NESTED, 3);
        let solution = outcome.solution().expect("solution");
        assert!(solution.feasible);
        assert_eq!(solution.len(), 1);
        assert!(solution.reduced_complexity >= 4);
    }

    #[test]
    fn test_agrees_with_exhaustive_on_fitness() {
        for threshold in [2, 3, 5] {
            let ilp = run_ilp(NESTED, threshold);
            let mut model = JavaSourceModel::new().unwrap();
            let tree = model.parse_all(NESTED).unwrap().remove(0);
            let notes = annotate(&tree);
            let candidates = select_candidates(&tree, &notes);
            let mut oracle = RefactoringOracle::new(&mut model, &tree, &notes);
            let evaluator = Evaluator::new(&tree, &notes, threshold);
            let exhaustive =
                ExhaustiveEngine::default().search(&mut oracle, &evaluator, &candidates);

            let (Some(a), Some(b)) = (ilp.solution(), exhaustive.solution()) else {
                panic!("both engines should find a solution at threshold {threshold}");
            };
            assert!(
                (a.fitness - b.fitness).abs() < 1e-9,
                "threshold {}: ilp fitness {} vs exhaustive {}",
                threshold,
                a.fitness,
                b.fitness
            );
        }
    }

    #[test]
    fn test_impossible_threshold_reports_none_feasible() {
        // a method whose body cannot be extracted at all (returns everywhere)
        // and whose CC exceeds the threshold has no ILP solution
        let source = indoc! {"
            class Sample {
                int f(int x) {
                    if (x > 0) {
                        return x;
                    }
                    if (x < -10) {
                        return -x;
                    }
                    return 0;
                }
            }
        "};
        let outcome = run_ilp(source, 1);
        assert!(outcome.solution().is_none());
    }
}
