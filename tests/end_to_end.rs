//! Whole-pipeline tests: plan, apply, undo, and engine agreement.

use cogsaw::apply::apply_solution;
use cogsaw::candidates::select_candidates;
use cogsaw::complexity::annotate;
use cogsaw::oracle::RefactoringOracle;
use cogsaw::planner::{EngineKind, Planner};
use cogsaw::search::{ExhaustiveEngine, IlpEngine};
use cogsaw::solution::Evaluator;
use cogsaw::source_model::{JavaSourceModel, SourceModel};
use indoc::indoc;
use pretty_assertions::assert_eq;

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

const LADDER: &str = indoc! {"
    class Ladder {
        int classify(int value, int limit) {
            int grade = 0;
            if (value > limit) {
                grade = 3;
            } else if (value > limit / 2) {
                grade = 2;
            } else if (value > 0) {
                grade = 1;
            }
            for (int i = 0; i < grade; i++) {
                if (i % 2 == 0 && value > i) {
                    value -= i;
                }
            }
            return value;
        }
    }
"};

fn planner(threshold: u32, engine: EngineKind) -> Planner {
    Planner {
        threshold,
        engine,
        ..Planner::default()
    }
}

#[test]
fn threshold_one_forces_extractions() {
    let reports = planner(1, EngineKind::Both).plan_source(NESTED).unwrap();
    let report = &reports[0];
    assert_eq!(report.complexity, 7);
    assert!(report.feasible);
    assert!(report.extraction_count >= 1);
}

#[test]
fn apply_then_undo_restores_the_source() {
    let mut model = JavaSourceModel::new().unwrap();
    let tree = model.parse_all(NESTED).unwrap().remove(0);
    let plan = planner(3, EngineKind::Exhaustive)
        .plan_method(&mut model, &tree)
        .unwrap();
    let solution = plan.outcome.solution().expect("solution");
    assert!(solution.len() >= 1);

    let applied = apply_solution(&mut model, &tree, solution).unwrap();
    assert_ne!(applied.text, NESTED);
    assert!(!model.has_compile_errors(&applied.text));
    assert_eq!(applied.undo().unwrap(), NESTED);
}

#[test]
fn refactored_ladder_still_parses_and_reverts() {
    let mut model = JavaSourceModel::new().unwrap();
    let tree = model.parse_all(LADDER).unwrap().remove(0);
    let notes = annotate(&tree);
    // if (1) + two else-if (2) + for (1) + nested if (2) + chain (1)
    assert_eq!(notes.method_complexity(), 7);

    let result = planner(4, EngineKind::Both).refactor_method(&mut model, &tree);
    let (plan, applied) = result.unwrap();
    assert!(plan.report.residual_complexity <= 7);
    assert!(!model.has_compile_errors(&applied.text));
    assert_eq!(applied.undo().unwrap(), LADDER);
}

#[test]
fn engines_agree_on_small_methods() {
    for threshold in [1, 2, 3, 5, 10] {
        let mut model = JavaSourceModel::new().unwrap();
        let tree = model.parse_all(NESTED).unwrap().remove(0);
        let notes = annotate(&tree);
        let candidates = select_candidates(&tree, &notes);
        let evaluator = Evaluator::new(&tree, &notes, threshold);

        let exhaustive = {
            let mut oracle = RefactoringOracle::new(&mut model, &tree, &notes);
            ExhaustiveEngine::default().search(&mut oracle, &evaluator, &candidates)
        };
        let mut ilp_model = JavaSourceModel::new().unwrap();
        let ilp = {
            let mut oracle = RefactoringOracle::new(&mut ilp_model, &tree, &notes);
            IlpEngine::new(threshold)
                .search(&mut oracle, &evaluator, &candidates)
                .unwrap()
        };

        match (exhaustive.solution(), ilp.solution()) {
            (Some(a), Some(b)) => {
                // the ILP only returns penalty-free solutions; whenever it
                // finds one, the exhaustive optimum must score the same
                assert!(
                    (a.fitness - b.fitness).abs() < 1e-9,
                    "threshold {}: exhaustive {} vs ilp {}",
                    threshold,
                    a.fitness,
                    b.fitness
                );
            }
            (Some(a), None) => {
                // no penalty-free selection exists at this threshold
                assert!(a.fitness > a.len() as f64, "threshold {}", threshold);
            }
            (None, _) => panic!("exhaustive search found nothing at threshold {}", threshold),
        }
    }
}

#[test]
fn failing_method_never_aborts_the_batch() {
    // the second method has an unextractable body (returns everywhere) but
    // still yields a report instead of an error
    let source = indoc! {"
        class Mixed {
            void loud(int n) {
                if (n > 0) {
                    System.out.println(n);
                }
            }

            int pick(int x) {
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
    let reports = planner(1, EngineKind::Both).plan_source(source).unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].method, "loud");
    assert_eq!(reports[1].method, "pick");
    // pick stays over the threshold with nothing extractable, yet reports
    // cleanly instead of failing
    assert!(reports[1].error.is_none());
    assert_eq!(reports[1].extraction_count, 0);
    assert!(reports[1].over_threshold());
}
