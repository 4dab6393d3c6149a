//! Popular random assignment.
//!
//! A random assignment `p` is popular when no other assignment wins a
//! majority vote against it, each agent voting for the row that
//! stochastically dominates the other under its own ranking and abstaining
//! when the rows are equal or incomparable.
//!
//! Candidates come from the expected-margin relaxation of that vote. Against
//! a deterministic matching `M`, agent `i` casts
//! `P(i gets a good it ranks above M_i) - P(i gets a good it ranks below M_i)`
//! and `margin(p, M)` is the sum of those votes. The mechanism maximizes `z`
//! subject to `p` doubly stochastic and `margin(p, M) >= z` for every
//! matching `M`, by cutting planes: the LP is solved over the matchings
//! collected so far, the most damaging matching for the current `p` is found
//! with the Hungarian method, and it is added as a new cut until no matching
//! beats `p` by more than `z`.
//!
//! The optimum is then put to the dominance vote against every matching
//! (one more Hungarian solve, see [`strongest_challenger`]). If it loses,
//! other points of the optimal face `margin >= z*` are tried: the vertices
//! maximizing and minimizing the agents' total Borda score, and the average
//! of the vertices found. When every candidate loses,
//! [`MechanismError::NoPopularAssignmentExists`] carries the one that lost
//! by the fewest votes.
//!
//! The LP is solved exactly with Bland's rule, which makes the chosen popular
//! assignment a deterministic function of the profile when several exist.

use num::rational::BigRational;
use num::traits::{One, Signed, Zero};
use num::BigInt;
use tracing::{debug, info, warn};

use ordalloc_ir::dominance::compare;
use ordalloc_ir::matching::min_cost_perfect_matching;
use ordalloc_ir::{AgentId, Assignment, GoodId, PreferenceProfile, Tolerance};
use ordalloc_lp::{ExactSimplex, LinearProgram, LpOutcome, LpSolver, Relation};
use ordalloc_prob::rational::{rational_matrix_to_f64, to_f64};

use super::{Mechanism, MechanismError, MechanismOutcome};
use crate::config::PopularOptions;

pub const NAME: &str = "Popular";

/// Exact optimum of the cutting-plane search.
#[derive(Debug, Clone, PartialEq)]
pub struct PopularSolution {
    pub shares: Vec<Vec<BigRational>>,
    /// Smallest majority margin of `shares` against any matching.
    pub margin: BigRational,
    /// Matchings that ended up as cuts, in the order they were added.
    pub cuts: Vec<Vec<GoodId>>,
    pub rounds: usize,
}

#[derive(Debug, Clone, Default)]
pub struct PopularAssignment {
    options: PopularOptions,
    tolerance: Tolerance,
}

fn int(n: i64) -> BigRational {
    BigRational::from_integer(BigInt::from(n))
}

/// `+1` if `agent` ranks `good` above `other`, `-1` if below, `0` if equal.
fn vote(profile: &PreferenceProfile, agent: AgentId, good: GoodId, other: GoodId) -> i64 {
    let (a, b) = (profile.rank_of(agent, good), profile.rank_of(agent, other));
    match a.cmp(&b) {
        std::cmp::Ordering::Less => 1,
        std::cmp::Ordering::Greater => -1,
        std::cmp::Ordering::Equal => 0,
    }
}

/// One converged cutting-plane search.
struct CutResult {
    shares: Vec<Vec<BigRational>>,
    margin: BigRational,
    rounds: usize,
}

impl PopularAssignment {
    pub fn new(options: PopularOptions, tolerance: Tolerance) -> Self {
        Self { options, tolerance }
    }

    /// Run the cutting-plane search and return the exact optimum, whether or
    /// not its margin is non-negative.
    pub fn solve(&self, profile: &PreferenceProfile) -> Result<PopularSolution, MechanismError> {
        let n = profile.num_agents();
        let mut objective = vec![BigRational::zero(); n * n + 1];
        objective[n * n] = int(1);
        let mut solver = ExactSimplex::with_max_pivots(self.options.max_pivots);
        let mut cuts = Vec::new();
        let found = self.cutting_plane(profile, &objective, None, &mut cuts, &mut solver)?;
        info!(
            agents = n,
            rounds = found.rounds,
            margin = %found.margin,
            "Popular: search converged"
        );
        Ok(PopularSolution {
            shares: found.shares,
            margin: found.margin,
            cuts,
            rounds: found.rounds,
        })
    }

    /// Maximize `objective` over `(p, z + n)` until no matching beats `p` by
    /// more than `z`, or by more than `floor` when one is given. Cuts found
    /// along the way are appended to `cuts`.
    fn cutting_plane(
        &self,
        profile: &PreferenceProfile,
        objective: &[BigRational],
        floor: Option<&BigRational>,
        cuts: &mut Vec<Vec<GoodId>>,
        solver: &mut ExactSimplex,
    ) -> Result<CutResult, MechanismError> {
        let n = profile.num_agents();
        let z_var = n * n;
        let n_int = int(n as i64);

        for round in 1..=self.options.max_rounds {
            let lp = self.relaxation(profile, objective, floor, cuts);
            let values = match solver.solve(&lp)? {
                LpOutcome::Optimal { values, .. } => values,
                LpOutcome::Infeasible => {
                    return Err(MechanismError::SolverFailure {
                        detail: "relaxation is infeasible",
                    })
                }
                LpOutcome::Unbounded => {
                    return Err(MechanismError::SolverFailure {
                        detail: "relaxation is unbounded",
                    })
                }
            };
            let shares: Vec<Vec<BigRational>> = (0..n)
                .map(|i| values[i * n..(i + 1) * n].to_vec())
                .collect();
            let z = &values[z_var] - &n_int;

            let cost: Vec<Vec<BigRational>> = (0..n)
                .map(|i| {
                    (0..n)
                        .map(|m| {
                            (0..n).fold(BigRational::zero(), |acc, g| {
                                match vote(profile, i, g, m) {
                                    0 => acc,
                                    s => acc + &shares[i][g] * int(s),
                                }
                            })
                        })
                        .collect()
                })
                .collect();
            let (matching, margin) =
                min_cost_perfect_matching(&cost).ok_or(MechanismError::SolverFailure {
                    detail: "no separating matching",
                })?;
            debug!(
                round,
                bound = %z,
                margin = %margin,
                pivots = solver.last_pivots(),
                "Popular: cutting-plane round"
            );
            if margin >= *floor.unwrap_or(&z) {
                return Ok(CutResult {
                    shares,
                    margin,
                    rounds: round,
                });
            }
            cuts.push(matching);
        }
        warn!(
            max_rounds = self.options.max_rounds,
            "Popular: cutting-plane round limit reached"
        );
        Err(MechanismError::RoundLimit {
            max_rounds: self.options.max_rounds,
        })
    }

    /// The LP over doubly-stochastic `p` (row-major, then `z + n` as the last
    /// variable) with one cut per collected matching, and `z >= floor` when
    /// a floor is given.
    fn relaxation(
        &self,
        profile: &PreferenceProfile,
        objective: &[BigRational],
        floor: Option<&BigRational>,
        cuts: &[Vec<GoodId>],
    ) -> LinearProgram {
        let n = profile.num_agents();
        let num_vars = n * n + 1;
        let z_var = n * n;
        let mut lp = LinearProgram::maximize(objective.to_vec());

        for agent in 0..n {
            let mut row = vec![BigRational::zero(); num_vars];
            for good in 0..n {
                row[agent * n + good] = int(1);
            }
            lp.add_constraint(row, Relation::Eq, int(1));
        }
        // The last column sum is implied by the others.
        for good in 0..n.saturating_sub(1) {
            let mut row = vec![BigRational::zero(); num_vars];
            for agent in 0..n {
                row[agent * n + good] = int(1);
            }
            lp.add_constraint(row, Relation::Eq, int(1));
        }
        let mut cap = vec![BigRational::zero(); num_vars];
        cap[z_var] = int(1);
        lp.add_constraint(cap.clone(), Relation::Le, int(2 * n as i64));
        if let Some(floor) = floor {
            lp.add_constraint(cap, Relation::Ge, floor + int(n as i64));
        }

        for matching in cuts {
            let mut row = vec![BigRational::zero(); num_vars];
            row[z_var] = int(1);
            for agent in 0..n {
                for good in 0..n {
                    let s = vote(profile, agent, good, matching[agent]);
                    if s != 0 {
                        row[agent * n + good] = int(-s);
                    }
                }
            }
            lp.add_constraint(row, Relation::Le, int(n as i64));
        }
        lp
    }

    /// Further points of the optimal face `margin >= z*`: the average of the
    /// face vertices found, then the Borda-maximal and Borda-minimal
    /// vertices.
    fn face_candidates(
        &self,
        profile: &PreferenceProfile,
        solution: &PopularSolution,
    ) -> Result<Vec<Vec<Vec<BigRational>>>, MechanismError> {
        let n = profile.num_agents();
        let mut solver = ExactSimplex::with_max_pivots(self.options.max_pivots);
        let mut cuts = solution.cuts.clone();
        let mut vertices = Vec::with_capacity(2);
        for sign in [1i64, -1] {
            let mut objective = vec![BigRational::zero(); n * n + 1];
            for agent in 0..n {
                for good in 0..n {
                    let score = (n - 1 - profile.rank_of(agent, good)) as i64;
                    objective[agent * n + good] = int(sign * score);
                }
            }
            let found = self.cutting_plane(
                profile,
                &objective,
                Some(&solution.margin),
                &mut cuts,
                &mut solver,
            )?;
            vertices.push(found.shares);
        }

        let count = int(vertices.len() as i64 + 1);
        let centre: Vec<Vec<BigRational>> = (0..n)
            .map(|agent| {
                (0..n)
                    .map(|good| {
                        vertices
                            .iter()
                            .fold(solution.shares[agent][good].clone(), |acc, v| {
                                acc + &v[agent][good]
                            })
                            / &count
                    })
                    .collect()
            })
            .collect();
        let mut candidates = Vec::with_capacity(vertices.len() + 1);
        candidates.push(centre);
        candidates.extend(vertices);
        Ok(candidates)
    }

    fn to_assignment(&self, shares: &[Vec<BigRational>]) -> Result<Assignment, MechanismError> {
        Ok(Assignment::new(
            rational_matrix_to_f64(shares)?,
            &self.tolerance,
        )?)
    }
}

impl Mechanism for PopularAssignment {
    fn name(&self) -> &str {
        NAME
    }

    fn assign(&self, profile: &PreferenceProfile) -> Result<MechanismOutcome, MechanismError> {
        let solution = self.solve(profile)?;
        if solution.margin.is_negative() {
            return Err(MechanismError::NoPopularAssignmentExists {
                best_margin: to_f64(&-&solution.margin)?,
                partial: Some(self.to_assignment(&solution.shares)?),
            });
        }

        let Some(first_loss) = strongest_challenger(profile, &solution.shares) else {
            return Ok(MechanismOutcome::exact(
                NAME,
                self.to_assignment(&solution.shares)?,
            ));
        };
        debug!(
            challenger = ?first_loss.0,
            deficit = first_loss.1.x_deficit(),
            "Popular: optimum loses a dominance vote, searching the optimal face"
        );
        let mut best = (solution.shares.clone(), first_loss.1);
        for shares in self.face_candidates(profile, &solution)? {
            match strongest_challenger(profile, &shares) {
                None => {
                    info!(agents = profile.num_agents(), "Popular: face point survives every vote");
                    return Ok(MechanismOutcome::exact(NAME, self.to_assignment(&shares)?));
                }
                Some((_, vote)) if vote.x_deficit() < best.1.x_deficit() => best = (shares, vote),
                Some(_) => {}
            }
        }
        warn!(
            agents = profile.num_agents(),
            deficit = best.1.x_deficit(),
            "Popular: every candidate loses a dominance vote"
        );
        Err(MechanismError::NoPopularAssignmentExists {
            best_margin: best.1.x_deficit() as f64,
            partial: Some(self.to_assignment(&best.0)?),
        })
    }
}

/// Head count of a pairwise majority vote between two assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MajorityVote {
    /// Agents whose row in `x` stochastically dominates their row in `y`.
    pub for_x: usize,
    /// Agents whose row in `y` stochastically dominates their row in `x`.
    pub for_y: usize,
}

impl MajorityVote {
    /// True if `y` defeats `x`.
    pub fn x_defeated(&self) -> bool {
        self.for_y > self.for_x
    }

    /// Votes by which `x` trails `y`; negative when `x` is ahead.
    pub fn x_deficit(&self) -> i64 {
        self.for_y as i64 - self.for_x as i64
    }
}

/// Let every agent vote between its rows of `x` and `y` by stochastic
/// dominance under its own ranking; incomparable or equal rows abstain.
pub fn majority_vote(
    profile: &PreferenceProfile,
    x: &Assignment,
    y: &Assignment,
    epsilon: f64,
) -> MajorityVote {
    let mut vote = MajorityVote { for_x: 0, for_y: 0 };
    for agent in 0..profile.num_agents() {
        let relation = compare(profile.ranking(agent), x.row(agent), y.row(agent), epsilon);
        if relation.x_dominates() {
            vote.for_x += 1;
        } else if relation.y_dominates() {
            vote.for_y += 1;
        }
    }
    vote
}

/// `votes[agent][good]` is how `agent` votes between its row of `shares`
/// and receiving `good` for sure: `+1` for the sure good, `-1` for the row,
/// `0` when they are equal or incomparable.
///
/// The sure good dominates the row exactly when the row puts no mass above
/// `good` and is not `good` itself; the row dominates exactly when it puts
/// no mass below `good` and is not `good` itself.
fn sure_good_votes(profile: &PreferenceProfile, shares: &[Vec<BigRational>]) -> Vec<Vec<i64>> {
    let n = profile.num_agents();
    let mut votes = vec![vec![0i64; n]; n];
    for (agent, row) in votes.iter_mut().enumerate() {
        let ranking = profile.ranking(agent);
        let lottery = &shares[agent];
        for (rank, &good) in ranking.iter().enumerate() {
            if lottery[good].is_one() {
                continue;
            }
            if ranking[..rank].iter().all(|&h| lottery[h].is_zero()) {
                row[good] = 1;
            } else if ranking[rank + 1..].iter().all(|&h| lottery[h].is_zero()) {
                row[good] = -1;
            }
        }
    }
    votes
}

/// The deterministic matching that beats `shares` by the widest head count
/// in a stochastic-dominance majority vote, with that vote, if any matching
/// beats it at all.
///
/// Each agent's vote depends only on the good it receives, so the widest
/// win is a maximum-weight perfect matching.
pub fn strongest_challenger(
    profile: &PreferenceProfile,
    shares: &[Vec<BigRational>],
) -> Option<(Vec<GoodId>, MajorityVote)> {
    let votes = sure_good_votes(profile, shares);
    let cost: Vec<Vec<BigRational>> = votes
        .iter()
        .map(|row| row.iter().map(|&v| int(-v)).collect())
        .collect();
    let (goods, _) = min_cost_perfect_matching(&cost)?;
    let mut vote = MajorityVote { for_x: 0, for_y: 0 };
    for (agent, &good) in goods.iter().enumerate() {
        match votes[agent][good] {
            1 => vote.for_y += 1,
            -1 => vote.for_x += 1,
            _ => {}
        }
    }
    vote.x_defeated().then_some((goods, vote))
}
