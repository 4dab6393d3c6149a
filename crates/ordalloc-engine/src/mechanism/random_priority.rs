//! Random Priority (random serial dictatorship).
//!
//! A uniformly random priority order is drawn over agents; each agent in turn
//! takes its favourite remaining good. The assignment is the average of these
//! serial-dictatorship outcomes over all `n!` orders, which is computed exactly
//! by enumeration up to [`RandomPriorityOptions::exact_threshold`] and
//! estimated by seeded sampling above it.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{info, warn};

use ordalloc_ir::permutation::{factorial, Permutations};
use ordalloc_ir::{AgentId, Assignment, GoodId, PreferenceProfile, Tolerance};
use ordalloc_prob::rational::{ratio, to_f64};

use super::{Exactness, Mechanism, MechanismError, MechanismOutcome};
use crate::config::RandomPriorityOptions;

pub const NAME: &str = "Random Priority";

#[derive(Debug, Clone, Default)]
pub struct RandomPriority {
    options: RandomPriorityOptions,
    tolerance: Tolerance,
}

impl RandomPriority {
    pub fn new(options: RandomPriorityOptions, tolerance: Tolerance) -> Self {
        Self { options, tolerance }
    }
}

/// Serial dictatorship: agents in `order` each take their best unclaimed good.
///
/// Returns the good of every agent, indexed by agent.
pub fn serial_dictatorship(profile: &PreferenceProfile, order: &[AgentId]) -> Vec<GoodId> {
    let n = profile.num_goods();
    let mut taken = vec![false; n];
    let mut goods = vec![0; profile.num_agents()];
    for &agent in order {
        if let Some(&good) = profile.ranking(agent).iter().find(|&&g| !taken[g]) {
            taken[good] = true;
            goods[agent] = good;
        }
    }
    goods
}

impl Mechanism for RandomPriority {
    fn name(&self) -> &str {
        NAME
    }

    fn assign(&self, profile: &PreferenceProfile) -> Result<MechanismOutcome, MechanismError> {
        let n = profile.num_agents();
        let mut counts = vec![vec![0u64; n]; n];
        let mut tally = |order: &[AgentId]| {
            for (agent, good) in serial_dictatorship(profile, order).into_iter().enumerate() {
                counts[agent][good] += 1;
            }
        };

        let exact_total = factorial(n).filter(|_| n <= self.options.exact_threshold);
        let (total, exactness) = match exact_total {
            Some(total) => {
                info!(agents = n, orders = total, "Random Priority: enumerating all priority orders");
                for order in Permutations::new(n) {
                    tally(&order);
                }
                (total, Exactness::Exact)
            }
            None => {
                let trials = self.options.sampling_trials.max(1);
                let seed = self.options.seed;
                warn!(
                    agents = n,
                    trials, seed, "Random Priority: sampling priority orders, result is approximate"
                );
                let mut rng = StdRng::seed_from_u64(seed);
                let mut order: Vec<AgentId> = (0..n).collect();
                for _ in 0..trials {
                    order.shuffle(&mut rng);
                    tally(&order);
                }
                (trials, Exactness::Sampled { trials, seed })
            }
        };

        let probs = counts
            .iter()
            .map(|row| row.iter().map(|&c| to_f64(&ratio(c, total))).collect())
            .collect::<Result<Vec<Vec<f64>>, _>>()?;
        let assignment = Assignment::new(probs, &self.tolerance)?;
        Ok(MechanismOutcome {
            mechanism: NAME.to_string(),
            assignment,
            exactness,
        })
    }
}
