//! Ex-post efficiency.
//!
//! An assignment is ex-post efficient when it is a lottery over
//! Pareto-optimal matchings. The greedy Birkhoff decomposition is checked
//! first, searching all `n!` matchings for one that Pareto-dominates each
//! support matching (`O(n! * n)` per term). Decompositions are not unique, so
//! a dominated term alone does not settle the question: the check then asks
//! an exact LP whether the assignment is a mixture of the Pareto-optimal
//! matchings inside its support, and only fails if it is not.
//!
//! That LP first reads each entry as the simplest fraction within
//! [`SNAP_ERROR`] and, when those fractions form an exactly doubly stochastic
//! matrix, demands equality. Otherwise each entry may miss its float value by
//! `tolerance.epsilon` and the program minimizes the total miss.

use num::rational::BigRational;
use num::traits::{One, Zero};
use tracing::{debug, info};

use ordalloc_ir::permutation::Permutations;
use ordalloc_ir::{
    AgentId, Assignment, GoodId, PermutationAssignment, PreferenceProfile, Tolerance,
};
use ordalloc_lp::{LinearProgram, LpOutcome, Relation};
use ordalloc_prob::rational::{from_f64, snap, to_f64};
use ordalloc_prob::{reconstruction_bound, BirkhoffDecomposer, Decomposition, DecompositionTerm};

use super::{Checked, VerifyError};
use crate::budget::BudgetMeter;
use crate::config::EngineOptions;
use crate::counterexample::Counterexample;
use crate::result::Verdict;

/// Largest gap between an entry and the fraction it is read as when looking
/// for an exact mixture.
pub const SNAP_ERROR: f64 = 1e-12;

pub(crate) fn check(
    profile: &PreferenceProfile,
    assignment: &Assignment,
    decomposition: Option<&Decomposition>,
    options: &EngineOptions,
    meter: &mut BudgetMeter,
) -> Result<Checked, VerifyError> {
    let computed;
    let decomposition = match decomposition {
        Some(d) => {
            if !d.describes(assignment, &options.tolerance) {
                return Err(VerifyError::ForeignDecomposition {
                    error: d.reconstruction_error(assignment),
                    bound: reconstruction_bound(assignment.n(), &options.tolerance),
                });
            }
            d
        }
        None => {
            computed = BirkhoffDecomposer::new(options.tolerance).decompose(assignment)?;
            &computed
        }
    };

    let mut counterexample = None;
    for term in decomposition.terms() {
        if !options.tolerance.is_positive(term.weight) {
            continue;
        }
        if let Some((dominating, better_off)) =
            pareto_improvement(profile, &term.permutation, meter)?
        {
            counterexample = Some(Counterexample::ParetoDominated {
                dominated: term.permutation.clone(),
                dominating,
                weight: term.weight,
                better_off,
            });
            break;
        }
    }
    let Some(counterexample) = counterexample else {
        return Ok(Checked::verdict(Verdict::Holds));
    };

    debug!("Decomposition uses a dominated matching, searching for an efficient one");
    match efficient_decomposition(profile, assignment, &options.tolerance, meter)? {
        Some(alternative) => {
            info!(
                terms = alternative.len(),
                "Found a decomposition over Pareto-optimal matchings"
            );
            Ok(Checked::with_note(
                Verdict::Holds,
                format!(
                    "the greedy decomposition uses a dominated matching, but the assignment \
                     is a lottery over {} Pareto-optimal matchings",
                    alternative.len()
                ),
            ))
        }
        None => Ok(Checked::verdict(Verdict::Fails { counterexample })),
    }
}

/// The first matching, in lexicographic order, that Pareto-dominates
/// `matching`, together with the agents strictly better off under it.
pub fn pareto_improvement(
    profile: &PreferenceProfile,
    matching: &PermutationAssignment,
    meter: &mut BudgetMeter,
) -> Result<Option<(PermutationAssignment, Vec<AgentId>)>, VerifyError> {
    let n = profile.num_agents();
    for goods in Permutations::new(n) {
        meter.tick()?;
        let mut strictly_better = Vec::new();
        let mut weakly_better = true;
        for (agent, &good) in goods.iter().enumerate() {
            let (new_rank, old_rank) = (
                profile.rank_of(agent, good),
                profile.rank_of(agent, matching.good_of(agent)),
            );
            if new_rank > old_rank {
                weakly_better = false;
                break;
            }
            if new_rank < old_rank {
                strictly_better.push(agent);
            }
        }
        if weakly_better && !strictly_better.is_empty() {
            return Ok(Some((PermutationAssignment::new(goods)?, strictly_better)));
        }
    }
    Ok(None)
}

/// Polynomial Pareto-optimality test.
///
/// With complete rankings a perfect matching is Pareto-optimal iff the graph
/// with an edge `i -> j` whenever `i` prefers `j`'s good to its own is
/// acyclic; a cycle would let its agents rotate goods.
pub fn is_pareto_optimal(profile: &PreferenceProfile, matching: &PermutationAssignment) -> bool {
    let n = profile.num_agents();
    let mut indegree = vec![0usize; n];
    let prefers = |i: AgentId, j: AgentId| {
        i != j && profile.prefers(i, matching.good_of(j), matching.good_of(i))
    };
    for i in 0..n {
        for j in 0..n {
            if prefers(i, j) {
                indegree[j] += 1;
            }
        }
    }
    let mut ready: Vec<AgentId> = (0..n).filter(|&j| indegree[j] == 0).collect();
    let mut removed = 0;
    while let Some(i) = ready.pop() {
        removed += 1;
        for j in 0..n {
            if prefers(i, j) {
                indegree[j] -= 1;
                if indegree[j] == 0 {
                    ready.push(j);
                }
            }
        }
    }
    removed == n
}

/// A decomposition of `assignment` using only Pareto-optimal matchings
/// inside its support, if one exists within `tolerance.epsilon` per entry.
pub fn efficient_decomposition(
    profile: &PreferenceProfile,
    assignment: &Assignment,
    tolerance: &Tolerance,
    meter: &mut BudgetMeter,
) -> Result<Option<Decomposition>, VerifyError> {
    let n = assignment.n();
    let mut candidates = Vec::new();
    for goods in Permutations::new(n) {
        meter.tick()?;
        let in_support = goods
            .iter()
            .enumerate()
            .all(|(agent, &good)| tolerance.is_positive(assignment.get(agent, good)));
        if !in_support {
            continue;
        }
        let matching = PermutationAssignment::new(goods)?;
        if is_pareto_optimal(profile, &matching) {
            candidates.push(matching);
        }
    }
    debug!(
        candidates = candidates.len(),
        "Pareto-optimal matchings inside the support"
    );
    if candidates.is_empty() {
        return Ok(None);
    }

    let support: Vec<(AgentId, GoodId)> = (0..n)
        .flat_map(|agent| (0..n).map(move |good| (agent, good)))
        .filter(|&(agent, good)| tolerance.is_positive(assignment.get(agent, good)))
        .collect();

    if let Some(targets) = exact_targets(assignment, &support)? {
        let lp = mixture_program(&candidates, &support, &targets, None);
        if let LpOutcome::Optimal { values, .. } = solve(meter, &lp)? {
            debug!("Assignment is an exact mixture of Pareto-optimal matchings");
            return mixture(n, &candidates, &values).map(Some);
        }
    }

    let targets = support
        .iter()
        .map(|&(agent, good)| from_f64(assignment.get(agent, good)))
        .collect::<Result<Vec<_>, _>>()?;
    let band = from_f64(tolerance.epsilon)?;
    let lp = mixture_program(&candidates, &support, &targets, Some(&band));
    match solve(meter, &lp)? {
        LpOutcome::Optimal { values, .. } => mixture(n, &candidates, &values).map(Some),
        LpOutcome::Infeasible | LpOutcome::Unbounded => Ok(None),
    }
}

fn solve(meter: &BudgetMeter, lp: &LinearProgram) -> Result<LpOutcome, VerifyError> {
    Ok(meter.solve_lp(lp)??)
}

/// The support entries read as simple fractions, if those fractions make
/// every row and column sum exactly one.
fn exact_targets(
    assignment: &Assignment,
    support: &[(AgentId, GoodId)],
) -> Result<Option<Vec<BigRational>>, VerifyError> {
    let n = assignment.n();
    let targets = support
        .iter()
        .map(|&(agent, good)| snap(assignment.get(agent, good), SNAP_ERROR))
        .collect::<Result<Vec<_>, _>>()?;
    let mut rows = vec![BigRational::zero(); n];
    let mut cols = vec![BigRational::zero(); n];
    for (&(agent, good), target) in support.iter().zip(&targets) {
        rows[agent] = &rows[agent] + target;
        cols[good] = &cols[good] + target;
    }
    let one = BigRational::one();
    Ok(rows.iter().chain(&cols).all(|sum| *sum == one).then_some(targets))
}

/// Weights over `candidates` summing to one whose mixture equals `targets` on
/// the support. With a `band`, every support entry gets an over and an under
/// slack variable bounded by `band`, and the program maximizes minus their
/// total.
fn mixture_program(
    candidates: &[PermutationAssignment],
    support: &[(AgentId, GoodId)],
    targets: &[BigRational],
    band: Option<&BigRational>,
) -> LinearProgram {
    let k = candidates.len();
    let width = if band.is_some() { k + 2 * support.len() } else { k };
    let mut lp = if band.is_some() {
        let mut objective = vec![BigRational::zero(); width];
        for coeff in &mut objective[k..] {
            *coeff = -BigRational::one();
        }
        LinearProgram::maximize(objective)
    } else {
        LinearProgram::feasibility(width)
    };

    let mut total = vec![BigRational::zero(); width];
    total[..k].fill(BigRational::one());
    lp.add_constraint(total, Relation::Eq, BigRational::one());

    for (cell, (&(agent, good), target)) in support.iter().zip(targets).enumerate() {
        let mut coeffs = vec![BigRational::zero(); width];
        for (coeff, matching) in coeffs.iter_mut().zip(candidates) {
            if matching.good_of(agent) == good {
                *coeff = BigRational::one();
            }
        }
        if let Some(band) = band {
            let (over, under) = (k + 2 * cell, k + 2 * cell + 1);
            coeffs[over] = -BigRational::one();
            coeffs[under] = BigRational::one();
            for slack in [over, under] {
                let mut bound = vec![BigRational::zero(); width];
                bound[slack] = BigRational::one();
                lp.add_constraint(bound, Relation::Le, band.clone());
            }
        }
        lp.add_constraint(coeffs, Relation::Eq, target.clone());
    }
    lp
}

/// The decomposition with the nonzero leading `weights` over `candidates`.
fn mixture(
    n: usize,
    candidates: &[PermutationAssignment],
    weights: &[BigRational],
) -> Result<Decomposition, VerifyError> {
    let mut terms = Vec::new();
    for (weight, permutation) in weights.iter().zip(candidates) {
        if weight.is_zero() {
            continue;
        }
        terms.push(DecompositionTerm {
            weight: to_f64(weight)?,
            permutation: permutation.clone(),
        });
    }
    Ok(Decomposition::from_terms(n, terms))
}
