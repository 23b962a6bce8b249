//! Search engines over the candidate extraction space.
//!
//! Two interchangeable strategies produce a [`Solution`]: the exhaustive
//! backtracking enumerator in [`exhaustive`] and the integer-linear-program
//! formulation in [`ilp`]. Both report through [`SearchOutcome`], which
//! distinguishes a certified optimum from a budget-limited best effort.

pub mod exhaustive;
pub mod ilp;
pub mod runs;
pub mod solver;

use crate::solution::Solution;

pub use exhaustive::ExhaustiveEngine;
pub use ilp::IlpEngine;
pub use runs::{ConsecutiveRuns, RunOrder};
pub use solver::{LpSolver, PoolSolver, Relation, VarId};

/// How a search ended. Termination is a value, not an exception.
#[derive(Debug)]
pub enum SearchOutcome {
    /// The space was exhausted (or the solver proved optimality); the
    /// solution cannot be beaten.
    Optimal(Solution),
    /// The evaluation budget or solver limit was hit first; the solution is
    /// the best seen but is not certified.
    Budgeted(Solution),
    /// No feasible solution exists.
    NoneFeasible,
}

impl SearchOutcome {
    pub fn solution(&self) -> Option<&Solution> {
        match self {
            SearchOutcome::Optimal(s) | SearchOutcome::Budgeted(s) => Some(s),
            SearchOutcome::NoneFeasible => None,
        }
    }

    pub fn into_solution(self) -> Option<Solution> {
        match self {
            SearchOutcome::Optimal(s) | SearchOutcome::Budgeted(s) => Some(s),
            SearchOutcome::NoneFeasible => None,
        }
    }

    pub fn is_certified(&self) -> bool {
        matches!(self, SearchOutcome::Optimal(_))
    }
}
