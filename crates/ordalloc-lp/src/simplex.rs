//! Dense two-phase simplex in exact rational arithmetic.
//!
//! Tableau columns are laid out as: the structural variables, then one
//! slack (`<=`, coefficient `+1`) or surplus (`>=`, coefficient `-1`) column
//! per inequality row in row order, then one artificial column per `>=` or
//! `=` row in row order. Rows with a negative right-hand side are negated
//! first. Phase 1 maximizes minus the sum of artificials; phase 2 maximizes the
//! real objective with artificial columns barred from entering.
//!
//! Pivoting follows Bland's rule: the entering column is the lowest-indexed
//! one with positive reduced cost, and ratio-test ties leave through the row
//! whose basic variable has the lowest index. This guarantees termination
//! and makes the returned vertex a deterministic function of the input.

use num::rational::BigRational;
use num::traits::{One, Signed, Zero};
use thiserror::Error;
use tracing::{debug, trace};

use crate::program::{LinearProgram, Relation};

/// Default bound on the number of pivots performed by one solve.
pub const DEFAULT_MAX_PIVOTS: usize = 200_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LpError {
    #[error("Constraint {constraint} has {found} coefficients, expected {expected}")]
    DimensionMismatch {
        constraint: usize,
        expected: usize,
        found: usize,
    },
    #[error("Simplex exceeded the pivot limit of {limit}")]
    PivotLimit { limit: usize },
}

/// Result of solving a [`LinearProgram`].
#[derive(Debug, Clone, PartialEq)]
pub enum LpOutcome {
    Optimal {
        values: Vec<BigRational>,
        objective: BigRational,
    },
    Infeasible,
    Unbounded,
}

impl LpOutcome {
    pub fn is_optimal(&self) -> bool {
        matches!(self, LpOutcome::Optimal { .. })
    }

    pub fn is_feasible(&self) -> bool {
        !matches!(self, LpOutcome::Infeasible)
    }
}

/// Abstract LP backend.
pub trait LpSolver {
    type Error: std::error::Error;

    /// Solve `lp`, maximizing its objective over `x >= 0`.
    fn solve(&mut self, lp: &LinearProgram) -> Result<LpOutcome, Self::Error>;
}

/// Exact two-phase simplex backend.
#[derive(Debug, Clone)]
pub struct ExactSimplex {
    max_pivots: usize,
    last_pivots: usize,
}

impl Default for ExactSimplex {
    fn default() -> Self {
        Self::with_max_pivots(DEFAULT_MAX_PIVOTS)
    }
}

impl ExactSimplex {
    pub fn with_max_pivots(max_pivots: usize) -> Self {
        Self {
            max_pivots,
            last_pivots: 0,
        }
    }

    /// Number of pivots performed by the most recent solve.
    pub fn last_pivots(&self) -> usize {
        self.last_pivots
    }
}

impl LpSolver for ExactSimplex {
    type Error = LpError;

    fn solve(&mut self, lp: &LinearProgram) -> Result<LpOutcome, LpError> {
        let mut tableau = Tableau::build(lp, self.max_pivots)?;
        let outcome = tableau.solve(lp);
        self.last_pivots = tableau.pivots;
        let outcome = outcome?;
        debug!(
            rows = tableau.rows.len(),
            cols = tableau.num_cols,
            pivots = tableau.pivots,
            optimal = outcome.is_optimal(),
            "Simplex finished"
        );
        Ok(outcome)
    }
}

enum PhaseEnd {
    Optimal,
    Unbounded,
}

struct Tableau {
    /// Each row holds `num_cols` coefficients followed by the right-hand side.
    rows: Vec<Vec<BigRational>>,
    basis: Vec<usize>,
    in_basis: Vec<bool>,
    artificial: Vec<bool>,
    num_vars: usize,
    num_cols: usize,
    pivots: usize,
    max_pivots: usize,
}

impl Tableau {
    fn build(lp: &LinearProgram, max_pivots: usize) -> Result<Self, LpError> {
        let num_vars = lp.num_vars();
        let mut normalized = Vec::with_capacity(lp.constraints().len());
        for (idx, c) in lp.constraints().iter().enumerate() {
            if c.coeffs.len() != num_vars {
                return Err(LpError::DimensionMismatch {
                    constraint: idx,
                    expected: num_vars,
                    found: c.coeffs.len(),
                });
            }
            if c.rhs.is_negative() {
                let coeffs: Vec<BigRational> = c.coeffs.iter().map(|a| -a).collect();
                normalized.push((coeffs, c.relation.flipped(), -&c.rhs));
            } else {
                normalized.push((c.coeffs.clone(), c.relation, c.rhs.clone()));
            }
        }

        let num_slack = normalized
            .iter()
            .filter(|(_, rel, _)| *rel != Relation::Eq)
            .count();
        let num_art = normalized
            .iter()
            .filter(|(_, rel, _)| *rel != Relation::Le)
            .count();
        let num_cols = num_vars + num_slack + num_art;

        let mut rows = Vec::with_capacity(normalized.len());
        let mut basis = Vec::with_capacity(normalized.len());
        let mut artificial = vec![false; num_cols];
        let mut slack_col = num_vars;
        let mut art_col = num_vars + num_slack;
        for (coeffs, relation, rhs) in normalized {
            let mut row = coeffs;
            row.resize(num_cols, BigRational::zero());
            row.push(rhs);
            match relation {
                Relation::Le => {
                    row[slack_col] = BigRational::one();
                    basis.push(slack_col);
                    slack_col += 1;
                }
                Relation::Ge => {
                    row[slack_col] = -BigRational::one();
                    slack_col += 1;
                    row[art_col] = BigRational::one();
                    artificial[art_col] = true;
                    basis.push(art_col);
                    art_col += 1;
                }
                Relation::Eq => {
                    row[art_col] = BigRational::one();
                    artificial[art_col] = true;
                    basis.push(art_col);
                    art_col += 1;
                }
            }
            rows.push(row);
        }

        let mut in_basis = vec![false; num_cols];
        for &col in &basis {
            in_basis[col] = true;
        }
        Ok(Self {
            rows,
            basis,
            in_basis,
            artificial,
            num_vars,
            num_cols,
            pivots: 0,
            max_pivots,
        })
    }

    fn solve(&mut self, lp: &LinearProgram) -> Result<LpOutcome, LpError> {
        if self.artificial.iter().any(|&a| a) {
            let phase1: Vec<BigRational> = self
                .artificial
                .iter()
                .map(|&a| {
                    if a {
                        -BigRational::one()
                    } else {
                        BigRational::zero()
                    }
                })
                .collect();
            let unbarred = vec![false; self.num_cols];
            // Phase 1 is bounded above by zero, so it always ends optimal.
            self.run(&phase1, &unbarred)?;
            if self.basic_objective(&phase1).is_negative() {
                trace!(pivots = self.pivots, "Phase 1 proved infeasibility");
                return Ok(LpOutcome::Infeasible);
            }
            self.drive_out_artificials()?;
        }

        let mut phase2 = lp.objective().to_vec();
        phase2.resize(self.num_cols, BigRational::zero());
        let barred = self.artificial.clone();
        if let PhaseEnd::Unbounded = self.run(&phase2, &barred)? {
            return Ok(LpOutcome::Unbounded);
        }

        let rhs = self.num_cols;
        let mut values = vec![BigRational::zero(); self.num_cols];
        for (row, &col) in self.rows.iter().zip(&self.basis) {
            values[col] = row[rhs].clone();
        }
        values.truncate(self.num_vars);
        let objective = lp
            .evaluate(&values)
            .unwrap_or_else(BigRational::zero);
        Ok(LpOutcome::Optimal { values, objective })
    }

    fn basic_objective(&self, cost: &[BigRational]) -> BigRational {
        let rhs = self.num_cols;
        self.rows
            .iter()
            .zip(&self.basis)
            .fold(BigRational::zero(), |acc, (row, &col)| {
                acc + &cost[col] * &row[rhs]
            })
    }

    /// Pivot basic artificials (all at value zero after a feasible phase 1)
    /// onto the first structural or slack column with a nonzero entry. Rows
    /// with no such column are redundant and keep their artificial.
    fn drive_out_artificials(&mut self) -> Result<(), LpError> {
        for r in 0..self.rows.len() {
            if !self.artificial[self.basis[r]] {
                continue;
            }
            let target =
                (0..self.num_cols).find(|&j| !self.artificial[j] && !self.rows[r][j].is_zero());
            if let Some(col) = target {
                self.pivot(r, col)?;
            }
        }
        Ok(())
    }

    fn run(&mut self, cost: &[BigRational], barred: &[bool]) -> Result<PhaseEnd, LpError> {
        loop {
            let Some(enter) = self.entering_column(cost, barred) else {
                return Ok(PhaseEnd::Optimal);
            };
            let Some(leave) = self.leaving_row(enter) else {
                return Ok(PhaseEnd::Unbounded);
            };
            self.pivot(leave, enter)?;
        }
    }

    fn entering_column(&self, cost: &[BigRational], barred: &[bool]) -> Option<usize> {
        (0..self.num_cols).find(|&j| {
            if barred[j] || self.in_basis[j] {
                return false;
            }
            let reduced = self
                .rows
                .iter()
                .zip(&self.basis)
                .fold(cost[j].clone(), |acc, (row, &col)| {
                    if row[j].is_zero() || cost[col].is_zero() {
                        acc
                    } else {
                        acc - &cost[col] * &row[j]
                    }
                });
            reduced.is_positive()
        })
    }

    fn leaving_row(&self, enter: usize) -> Option<usize> {
        let rhs = self.num_cols;
        let mut best: Option<(BigRational, usize)> = None;
        for (r, row) in self.rows.iter().enumerate() {
            if !row[enter].is_positive() {
                continue;
            }
            let ratio = &row[rhs] / &row[enter];
            let better = match &best {
                None => true,
                Some((best_ratio, best_r)) => {
                    ratio < *best_ratio
                        || (ratio == *best_ratio && self.basis[r] < self.basis[*best_r])
                }
            };
            if better {
                best = Some((ratio, r));
            }
        }
        best.map(|(_, r)| r)
    }

    fn pivot(&mut self, r: usize, c: usize) -> Result<(), LpError> {
        let pivot_value = self.rows[r][c].clone();
        for x in self.rows[r].iter_mut() {
            *x /= &pivot_value;
        }
        let pivot_row = self.rows[r].clone();
        for (k, row) in self.rows.iter_mut().enumerate() {
            if k == r || row[c].is_zero() {
                continue;
            }
            let factor = row[c].clone();
            for (x, y) in row.iter_mut().zip(&pivot_row) {
                if !y.is_zero() {
                    *x -= &factor * y;
                }
            }
        }
        self.in_basis[self.basis[r]] = false;
        self.in_basis[c] = true;
        self.basis[r] = c;

        self.pivots += 1;
        if self.pivots > self.max_pivots {
            return Err(LpError::PivotLimit {
                limit: self.max_pivots,
            });
        }
        Ok(())
    }
}
