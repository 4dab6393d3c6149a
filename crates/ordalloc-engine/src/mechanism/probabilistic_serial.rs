//! Probabilistic Serial (simultaneous eating).
//!
//! Every agent eats its favourite non-exhausted good at unit speed on the
//! clock interval `[0, 1]`. The simulation is an exact discrete-event loop:
//! a min-heap holds the projected exhaustion time of every good being eaten,
//! and the clock jumps from one exhaustion to the next. Goods whose projected
//! times coincide are exhausted in the same event.

use num::rational::BigRational;
use num::traits::{One, Zero};
use num::BigInt;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use tracing::{debug, info};

use ordalloc_ir::{AgentId, Assignment, GoodId, PreferenceProfile, Tolerance};
use ordalloc_prob::rational::rational_matrix_to_f64;

use super::{Mechanism, MechanismError, MechanismOutcome};

pub const NAME: &str = "Probabilistic Serial";

/// Goods exhausted at one instant of the eating clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EatingEvent {
    pub time: BigRational,
    pub exhausted: Vec<GoodId>,
}

/// Exact result of the eating simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EatingRun {
    /// `shares[agent][good]`: amount of `good` eaten by `agent`.
    pub shares: Vec<Vec<BigRational>>,
    pub events: Vec<EatingEvent>,
}

#[derive(Debug, Clone, Default)]
pub struct ProbabilisticSerial {
    tolerance: Tolerance,
}

impl ProbabilisticSerial {
    pub fn new(tolerance: Tolerance) -> Self {
        Self { tolerance }
    }

    /// Run the eating simulation in exact arithmetic.
    pub fn eat(&self, profile: &PreferenceProfile) -> EatingRun {
        let n = profile.num_agents();
        let mut remaining = vec![BigRational::one(); n];
        let mut exhausted = vec![false; n];
        let mut eaters = vec![0usize; n];
        let mut version = vec![0u64; n];
        let mut position = vec![0usize; n];
        let mut shares = vec![vec![BigRational::zero(); n]; n];
        let mut events = Vec::new();
        let mut clock = BigRational::zero();
        let mut heap: BinaryHeap<Reverse<(BigRational, GoodId, u64)>> = BinaryHeap::new();

        let current = |position: &[usize], agent: AgentId| profile.ranking(agent)[position[agent]];
        for agent in 0..n {
            eaters[current(&position, agent)] += 1;
        }
        for good in 0..n {
            if eaters[good] > 0 {
                heap.push(Reverse((
                    exhaustion_time(&clock, &remaining[good], eaters[good]),
                    good,
                    version[good],
                )));
            }
        }

        while let Some(Reverse((time, good, stamp))) = heap.pop() {
            if exhausted[good] || stamp != version[good] {
                continue;
            }
            let mut batch = vec![good];
            while let Some(Reverse((next_time, next_good, next_stamp))) = heap.peek() {
                if *next_time != time {
                    break;
                }
                if !exhausted[*next_good] && *next_stamp == version[*next_good] {
                    batch.push(*next_good);
                }
                heap.pop();
            }
            batch.sort_unstable();
            batch.dedup();

            let elapsed = &time - &clock;
            for agent in 0..n {
                shares[agent][current(&position, agent)] += &elapsed;
            }
            for g in 0..n {
                if eaters[g] > 0 && !exhausted[g] {
                    remaining[g] -= &elapsed * BigRational::from_integer(BigInt::from(eaters[g]));
                }
            }
            clock = time;
            for &g in &batch {
                exhausted[g] = true;
                remaining[g] = BigRational::zero();
            }
            debug!(time = %clock, exhausted = ?batch, "Eating event");
            events.push(EatingEvent {
                time: clock.clone(),
                exhausted: batch,
            });

            let mut changed = Vec::new();
            for agent in 0..n {
                let old = current(&position, agent);
                if !exhausted[old] {
                    continue;
                }
                let ranking = profile.ranking(agent);
                let next = (position[agent]..n).find(|&p| !exhausted[ranking[p]]);
                eaters[old] -= 1;
                if let Some(p) = next {
                    position[agent] = p;
                    eaters[ranking[p]] += 1;
                    changed.push(ranking[p]);
                }
            }
            changed.sort_unstable();
            changed.dedup();
            for g in changed {
                version[g] += 1;
                heap.push(Reverse((
                    exhaustion_time(&clock, &remaining[g], eaters[g]),
                    g,
                    version[g],
                )));
            }
        }

        EatingRun { shares, events }
    }
}

fn exhaustion_time(clock: &BigRational, remaining: &BigRational, eaters: usize) -> BigRational {
    clock + remaining / BigRational::from_integer(BigInt::from(eaters))
}

impl Mechanism for ProbabilisticSerial {
    fn name(&self) -> &str {
        NAME
    }

    fn assign(&self, profile: &PreferenceProfile) -> Result<MechanismOutcome, MechanismError> {
        let run = self.eat(profile);
        info!(
            agents = profile.num_agents(),
            events = run.events.len(),
            "Probabilistic Serial: eating complete"
        );
        let probs = rational_matrix_to_f64(&run.shares)?;
        let assignment = Assignment::new(probs, &self.tolerance)?;
        Ok(MechanismOutcome::exact(NAME, assignment))
    }
}
