//! Birkhoff-von Neumann decomposition.
//!
//! Every doubly-stochastic matrix is a convex combination of permutation
//! matrices. The greedy construction repeatedly extracts a perfect matching
//! from the positive support of the residual and removes as much of it as the
//! smallest matched entry allows. Each step strictly shrinks the support and
//! therefore moves to a proper face of the Birkhoff polytope, which bounds the
//! number of terms by `n^2 - 2n + 2`.
//!
//! The greedy runs in exact rational arithmetic on the input's `f64` values,
//! so the matched minimum always leaves the support exactly. Inputs are only
//! doubly stochastic up to `epsilon`; the first pass stops once the residual
//! has no perfect matching, and its weights are rescaled to sum to one. The
//! result is an exact decomposition of a doubly-stochastic matrix within
//! [`reconstruction_bound`] of the input. If the first pass needed more terms
//! than the classical bound allows, the greedy is rerun on that exact matrix.

use num::rational::BigRational;
use num::traits::{One, Signed, Zero};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use ordalloc_ir::matching::perfect_matching;
use ordalloc_ir::{Assignment, AssignmentError, PermutationAssignment, Tolerance};

use crate::rational::{from_f64, to_f64, RationalError};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecompositionError {
    #[error("Input is not doubly stochastic: {0}")]
    NotDoublyStochastic(#[from] AssignmentError),
    #[error(
        "No perfect matching on the residual support after {terms} term(s) \
         (residual mass {residual_mass})"
    )]
    NoSupportMatching { terms: usize, residual_mass: f64 },
    #[error("Decomposition did not converge within {limit} terms")]
    TooManyTerms { limit: usize },
    #[error("Decomposition is {error} away from its input, more than {bound}")]
    Inexact { error: f64, bound: f64 },
    #[error("Rational conversion failed: {0}")]
    Rational(#[from] RationalError),
}

/// One weighted permutation of a decomposition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecompositionTerm {
    pub weight: f64,
    pub permutation: PermutationAssignment,
}

/// Weighted permutation assignments whose mixture reconstructs an assignment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decomposition {
    n: usize,
    terms: Vec<DecompositionTerm>,
}

impl Decomposition {
    /// Assemble a decomposition from explicit terms (all of size `n`).
    pub fn from_terms(n: usize, terms: Vec<DecompositionTerm>) -> Self {
        Self { n, terms }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn terms(&self) -> &[DecompositionTerm] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn total_weight(&self) -> f64 {
        self.terms.iter().map(|t| t.weight).sum()
    }

    /// The weighted sum of the permutation matrices.
    ///
    /// Terms whose permutation has a different size than the decomposition
    /// are skipped.
    pub fn reconstruct(&self) -> Vec<Vec<f64>> {
        let mut probs = vec![vec![0.0; self.n]; self.n];
        for term in self.terms.iter().filter(|t| t.permutation.n() == self.n) {
            for (agent, row) in probs.iter_mut().enumerate() {
                row[term.permutation.good_of(agent)] += term.weight;
            }
        }
        probs
    }

    /// Largest entrywise gap between [`Self::reconstruct`] and `assignment`.
    pub fn reconstruction_error(&self, assignment: &Assignment) -> f64 {
        if assignment.n() != self.n || self.terms.iter().any(|t| t.permutation.n() != self.n) {
            return f64::INFINITY;
        }
        self.reconstruct()
            .iter()
            .zip(assignment.rows())
            .flat_map(|(r, a)| r.iter().zip(a).map(|(x, y)| (x - y).abs()))
            .fold(0.0, f64::max)
    }

    /// True if this decomposition is of `assignment`, up to
    /// [`reconstruction_bound`].
    pub fn describes(&self, assignment: &Assignment, tolerance: &Tolerance) -> bool {
        self.reconstruction_error(assignment) <= reconstruction_bound(self.n, tolerance)
    }
}

/// Classical upper bound on the number of permutations needed for an `n x n`
/// doubly-stochastic matrix.
pub fn term_bound(n: usize) -> usize {
    if n == 0 {
        0
    } else {
        // n^2 - 2n + 2
        (n - 1) * (n - 1) + 1
    }
}

/// Largest entrywise reconstruction error [`BirkhoffDecomposer`] accepts for
/// an `n x n` input whose row and column sums are within `epsilon` of one.
///
/// When the first greedy pass stalls, the extracted weight `W` satisfies
/// `1 - W <= (2n - 1) * epsilon` and every residual entry is at most
/// `2n * epsilon`; rescaling by `1 / W` adds at most `1 - W` more.
pub fn reconstruction_bound(n: usize, tolerance: &Tolerance) -> f64 {
    4.0 * n.max(1) as f64 * tolerance.epsilon
}

/// Greedy Birkhoff-von Neumann decomposer.
#[derive(Debug, Clone, Default)]
pub struct BirkhoffDecomposer {
    tolerance: Tolerance,
}

impl BirkhoffDecomposer {
    pub fn new(tolerance: Tolerance) -> Self {
        Self { tolerance }
    }

    /// Decompose `assignment` into weighted permutation assignments.
    ///
    /// Matchings are found by augmenting paths over agents and goods in
    /// ascending order, so the decomposition is deterministic.
    pub fn decompose(&self, assignment: &Assignment) -> Result<Decomposition, DecompositionError> {
        let checked = Assignment::new(assignment.rows().to_vec(), &self.tolerance)?;
        let n = checked.n();
        let mut residual = Vec::with_capacity(n);
        for row in checked.rows() {
            let mut exact = Vec::with_capacity(n);
            for &x in row {
                exact.push(if self.tolerance.is_positive(x) {
                    from_f64(x)?
                } else {
                    BigRational::zero()
                });
            }
            residual.push(exact);
        }

        let limit = term_bound(n);
        let mut terms = greedy(residual);
        let extracted = terms
            .iter()
            .fold(BigRational::zero(), |acc, (w, _)| acc + w);
        if !extracted.is_positive() {
            return Err(DecompositionError::NoSupportMatching {
                terms: 0,
                residual_mass: checked.rows().iter().flatten().sum::<f64>() / n as f64,
            });
        }
        if !extracted.is_one() {
            for (weight, _) in terms.iter_mut() {
                *weight /= &extracted;
            }
        }
        if terms.len() > limit {
            debug!(n, terms = terms.len(), "Regreedying the rescaled matrix");
            let mut exact = vec![vec![BigRational::zero(); n]; n];
            for (weight, goods) in &terms {
                for (agent, &good) in goods.iter().enumerate() {
                    exact[agent][good] += weight;
                }
            }
            terms = greedy(exact);
        }
        if terms.len() > limit {
            return Err(DecompositionError::TooManyTerms { limit });
        }

        let mut out = Vec::with_capacity(terms.len());
        for (weight, goods) in terms {
            out.push(DecompositionTerm {
                weight: to_f64(&weight)?,
                permutation: PermutationAssignment::new(goods)?,
            });
        }
        let decomposition = Decomposition { n, terms: out };
        let error = decomposition.reconstruction_error(&checked);
        let bound = reconstruction_bound(n, &self.tolerance);
        if error > bound {
            return Err(DecompositionError::Inexact { error, bound });
        }
        debug!(
            n,
            terms = decomposition.len(),
            error,
            "Birkhoff decomposition complete"
        );
        Ok(decomposition)
    }
}

/// Extract support matchings from `residual` until it has none left.
/// Returns `(weight, goods)` pairs; weights are not normalized.
///
/// Every step zeroes at least one entry exactly, so at most `n^2` terms come
/// back.
fn greedy(mut residual: Vec<Vec<BigRational>>) -> Vec<(BigRational, Vec<usize>)> {
    let mut terms = Vec::new();
    loop {
        let support: Vec<Vec<bool>> = residual
            .iter()
            .map(|row| row.iter().map(Signed::is_positive).collect())
            .collect();
        let Some(goods) = perfect_matching(&support) else {
            return terms;
        };
        let Some(weight) = goods
            .iter()
            .enumerate()
            .map(|(agent, &good)| &residual[agent][good])
            .min()
            .cloned()
        else {
            return terms;
        };
        for (agent, &good) in goods.iter().enumerate() {
            residual[agent][good] -= &weight;
        }
        terms.push((weight, goods));
    }
}
