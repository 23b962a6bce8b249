//! Linear-program solver abstraction and the bundled pool solver.
//!
//! The ILP engine talks to a solver only through [`LpSolver`], so a real
//! MILP backend can be slotted in without touching the model construction.
//! [`PoolSolver`] is the bundled pure-Rust implementation: branch-and-bound
//! over binary variables with per-constraint interval pruning, keeping a
//! pool of every assignment tied with the optimum rather than a single
//! winner. All variables are binary, which is all the extraction model
//! needs.

use crate::errors::{Error, Result};

/// Opaque handle for a solver variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VarId(usize);

impl VarId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Sense of a linear constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
    Le,
    Ge,
    Eq,
}

/// Minimal interface the ILP engine needs from a 0-1 program solver.
pub trait LpSolver {
    fn new_bool_var(&mut self) -> VarId;

    /// Add `sum(coef * var) relation bound`.
    fn add_linear_constraint(&mut self, terms: &[(VarId, f64)], relation: Relation, bound: f64);

    /// Set the objective to minimize.
    fn minimize(&mut self, objective: &[(VarId, f64)]);

    /// Run the solver. An infeasible program is not an error; it leaves the
    /// solution pool empty.
    fn solve(&mut self) -> Result<()>;

    /// Number of optimum-tied solutions found.
    fn solution_pool_size(&self) -> usize;

    fn value_in_solution(&self, var: VarId, index: usize) -> bool;

    fn objective_value(&self, index: usize) -> f64;

    /// Whether the search space was fully explored, so the pool really holds
    /// the optimum.
    fn certified_optimal(&self) -> bool;
}

const EPS: f64 = 1e-6;

struct Constraint {
    terms: Vec<(usize, f64)>,
    relation: Relation,
    bound: f64,
}

/// Branch-and-bound over binary variables. Branches try 0 before 1, so the
/// sparsest assignments surface first; a node limit caps the work and is
/// reported through [`LpSolver::certified_optimal`].
pub struct PoolSolver {
    num_vars: usize,
    constraints: Vec<Constraint>,
    objective: Vec<f64>,
    node_limit: u64,
    max_pool_size: usize,
    nodes: u64,
    limit_hit: bool,
    best: f64,
    pool: Vec<Vec<bool>>,
}

impl Default for PoolSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolSolver {
    pub fn new() -> Self {
        Self {
            num_vars: 0,
            constraints: Vec::new(),
            objective: Vec::new(),
            node_limit: 1_000_000,
            max_pool_size: 64,
            nodes: 0,
            limit_hit: false,
            best: f64::INFINITY,
            pool: Vec::new(),
        }
    }

    pub fn with_node_limit(mut self, node_limit: u64) -> Self {
        self.node_limit = node_limit;
        self
    }

    /// Feasibility interval of one constraint under a partial assignment:
    /// the reachable [min, max] of its left-hand side. `None` means the
    /// constraint can no longer be satisfied.
    fn still_satisfiable(&self, constraint: &Constraint, assignment: &[Option<bool>]) -> bool {
        let mut lo = 0.0;
        let mut hi = 0.0;
        for &(var, coef) in &constraint.terms {
            match assignment[var] {
                Some(true) => {
                    lo += coef;
                    hi += coef;
                }
                Some(false) => {}
                None => {
                    if coef < 0.0 {
                        lo += coef;
                    } else {
                        hi += coef;
                    }
                }
            }
        }
        match constraint.relation {
            Relation::Le => lo <= constraint.bound + EPS,
            Relation::Ge => hi >= constraint.bound - EPS,
            Relation::Eq => lo <= constraint.bound + EPS && hi >= constraint.bound - EPS,
        }
    }

    /// Lower bound on the objective completing a partial assignment.
    fn objective_floor(&self, assignment: &[Option<bool>]) -> f64 {
        let mut floor = 0.0;
        for (var, &coef) in self.objective.iter().enumerate() {
            match assignment[var] {
                Some(true) => floor += coef,
                Some(false) => {}
                None => {
                    if coef < 0.0 {
                        floor += coef;
                    }
                }
            }
        }
        floor
    }

    fn descend(&mut self, assignment: &mut Vec<Option<bool>>, depth: usize) {
        if self.limit_hit {
            return;
        }
        self.nodes += 1;
        if self.nodes > self.node_limit {
            self.limit_hit = true;
            return;
        }

        for constraint in &self.constraints {
            if !self.still_satisfiable(constraint, assignment) {
                return;
            }
        }
        // ties with the incumbent stay alive to fill the pool
        if self.objective_floor(assignment) > self.best + EPS {
            return;
        }

        if depth == self.num_vars {
            self.record(assignment);
            return;
        }

        for value in [false, true] {
            assignment[depth] = Some(value);
            self.descend(assignment, depth + 1);
            if self.limit_hit {
                return;
            }
        }
        assignment[depth] = None;
    }

    fn record(&mut self, assignment: &[Option<bool>]) {
        let complete: Vec<bool> = assignment.iter().map(|v| v.unwrap_or(false)).collect();
        let value: f64 = complete
            .iter()
            .zip(&self.objective)
            .filter(|(set, _)| **set)
            .map(|(_, coef)| coef)
            .sum();
        if value < self.best - EPS {
            self.best = value;
            self.pool.clear();
            self.pool.push(complete);
        } else if value <= self.best + EPS && self.pool.len() < self.max_pool_size {
            self.pool.push(complete);
        }
    }
}

impl LpSolver for PoolSolver {
    fn new_bool_var(&mut self) -> VarId {
        let id = VarId(self.num_vars);
        self.num_vars += 1;
        self.objective.resize(self.num_vars, 0.0);
        id
    }

    fn add_linear_constraint(&mut self, terms: &[(VarId, f64)], relation: Relation, bound: f64) {
        self.constraints.push(Constraint {
            terms: terms.iter().map(|(v, c)| (v.0, *c)).collect(),
            relation,
            bound,
        });
    }

    fn minimize(&mut self, objective: &[(VarId, f64)]) {
        self.objective = vec![0.0; self.num_vars];
        for &(var, coef) in objective {
            self.objective[var.0] += coef;
        }
    }

    fn solve(&mut self) -> Result<()> {
        for constraint in &self.constraints {
            if constraint.terms.iter().any(|&(v, _)| v >= self.num_vars) {
                return Err(Error::Solver(
                    "constraint references an unknown variable".to_string(),
                ));
            }
        }
        self.nodes = 0;
        self.limit_hit = false;
        self.best = f64::INFINITY;
        self.pool.clear();
        let mut assignment = vec![None; self.num_vars];
        self.descend(&mut assignment, 0);
        log::debug!(
            "pool solver explored {} nodes, pool size {}, best {}",
            self.nodes,
            self.pool.len(),
            self.best
        );
        Ok(())
    }

    fn solution_pool_size(&self) -> usize {
        self.pool.len()
    }

    fn value_in_solution(&self, var: VarId, index: usize) -> bool {
        self.pool[index][var.0]
    }

    fn objective_value(&self, index: usize) -> f64 {
        self.pool[index]
            .iter()
            .zip(&self.objective)
            .filter(|(set, _)| **set)
            .map(|(_, coef)| coef)
            .sum()
    }

    fn certified_optimal(&self) -> bool {
        !self.limit_hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconstrained_minimum_is_all_zero() {
        let mut solver = PoolSolver::new();
        let x = solver.new_bool_var();
        let y = solver.new_bool_var();
        solver.minimize(&[(x, 1.0), (y, 1.0)]);
        solver.solve().unwrap();
        assert_eq!(solver.solution_pool_size(), 1);
        assert!(!solver.value_in_solution(x, 0));
        assert!(!solver.value_in_solution(y, 0));
        assert!(solver.certified_optimal());
    }

    #[test]
    fn test_covering_constraint_forces_a_variable() {
        let mut solver = PoolSolver::new();
        let x = solver.new_bool_var();
        let y = solver.new_bool_var();
        // x + y >= 1, minimize x + 2y: x alone wins
        solver.add_linear_constraint(&[(x, 1.0), (y, 1.0)], Relation::Ge, 1.0);
        solver.minimize(&[(x, 1.0), (y, 2.0)]);
        solver.solve().unwrap();
        assert_eq!(solver.solution_pool_size(), 1);
        assert!(solver.value_in_solution(x, 0));
        assert!(!solver.value_in_solution(y, 0));
        assert!((solver.objective_value(0) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_tied_optima_fill_the_pool() {
        let mut solver = PoolSolver::new();
        let x = solver.new_bool_var();
        let y = solver.new_bool_var();
        // exactly one of two symmetric variables
        solver.add_linear_constraint(&[(x, 1.0), (y, 1.0)], Relation::Eq, 1.0);
        solver.minimize(&[(x, 1.0), (y, 1.0)]);
        solver.solve().unwrap();
        assert_eq!(solver.solution_pool_size(), 2);
        let picks: Vec<bool> = (0..2).map(|i| solver.value_in_solution(x, i)).collect();
        assert!(picks.contains(&true) && picks.contains(&false));
    }

    #[test]
    fn test_infeasible_program_leaves_pool_empty() {
        let mut solver = PoolSolver::new();
        let x = solver.new_bool_var();
        solver.add_linear_constraint(&[(x, 1.0)], Relation::Ge, 2.0);
        solver.minimize(&[(x, 1.0)]);
        solver.solve().unwrap();
        assert_eq!(solver.solution_pool_size(), 0);
        assert!(solver.certified_optimal());
    }

    #[test]
    fn test_forced_variable_via_equality() {
        let mut solver = PoolSolver::new();
        let root = solver.new_bool_var();
        let x = solver.new_bool_var();
        solver.add_linear_constraint(&[(root, 1.0)], Relation::Eq, 1.0);
        // root conflicts with nothing; x stays off under minimization
        solver.minimize(&[(x, 1.0)]);
        solver.solve().unwrap();
        assert!(solver.value_in_solution(root, 0));
        assert!(!solver.value_in_solution(x, 0));
    }

    #[test]
    fn test_node_limit_is_reported() {
        let mut solver = PoolSolver::new().with_node_limit(2);
        let vars: Vec<VarId> = (0..8).map(|_| solver.new_bool_var()).collect();
        let objective: Vec<(VarId, f64)> = vars.iter().map(|v| (*v, 1.0)).collect();
        solver.add_linear_constraint(&objective, Relation::Ge, 4.0);
        solver.minimize(&objective);
        solver.solve().unwrap();
        assert!(!solver.certified_optimal());
    }

    #[test]
    fn test_unknown_variable_is_rejected() {
        let mut solver = PoolSolver::new();
        let x = solver.new_bool_var();
        let mut other = PoolSolver::new();
        other.new_bool_var();
        let ghost = other.new_bool_var();
        solver.add_linear_constraint(&[(x, 1.0), (ghost, 1.0)], Relation::Le, 1.0);
        assert!(solver.solve().is_err());
    }
}
