//! Strategy-proofness by misreport search.
//!
//! For each agent every candidate false ranking is reported with all other
//! rankings held at the truth, the mechanism is re-run, and the agent's new
//! lottery is compared with its truthful one under its true ranking. The
//! truthful lottery is recomputed from the profile rather than taken from the
//! caller, so the check is about the mechanism alone.

use tracing::{debug, warn};

use ordalloc_ir::dominance::compare;
use ordalloc_ir::permutation::{adjacent_swaps, factorial, Permutations};
use ordalloc_ir::{GoodId, PreferenceProfile, SdRelation};

use super::{Checked, VerifyError};
use crate::budget::BudgetMeter;
use crate::config::{EngineOptions, MisreportScope};
use crate::counterexample::Counterexample;
use crate::mechanism::{Mechanism, MechanismError};
use crate::result::Verdict;

pub(crate) fn check(
    profile: &PreferenceProfile,
    mechanism: &dyn Mechanism,
    options: &EngineOptions,
    meter: &mut BudgetMeter,
) -> Result<Checked, VerifyError> {
    let truthful = mechanism.assign(profile)?;
    if !truthful.exactness.is_exact() {
        warn!(
            mechanism = mechanism.name(),
            "Checking strategy-proofness against an approximate mechanism"
        );
    }
    let n = profile.num_agents();
    let exhaustive = options.misreports.is_exhaustive_for(n);
    let epsilon = options.tolerance.epsilon;

    for agent in 0..n {
        let truth = profile.ranking(agent);
        for false_ranking in misreports(truth, exhaustive) {
            meter.tick()?;
            let reported = profile.with_ranking(agent, false_ranking.clone())?;
            // A report the mechanism cannot serve gains the agent nothing.
            let outcome = match mechanism.assign(&reported) {
                Ok(outcome) => outcome,
                Err(MechanismError::NoPopularAssignmentExists { .. }) => {
                    debug!(agent, ?false_ranking, "Mechanism has no outcome for this report");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let manipulated = outcome.assignment.row(agent);
            let honest = truthful.assignment.row(agent);
            if let SdRelation::Dominates { prefix } = compare(truth, manipulated, honest, epsilon) {
                debug!(agent, ?false_ranking, prefix, "Profitable misreport found");
                return Ok(Checked::verdict(Verdict::Fails {
                    counterexample: Counterexample::Manipulation {
                        agent,
                        false_ranking,
                        truthful_row: honest.to_vec(),
                        manipulated_row: manipulated.to_vec(),
                        prefix,
                    },
                }));
            }
        }
    }

    if exhaustive {
        let per_agent = factorial(n).map_or(u64::MAX, |f| f.saturating_sub(1));
        debug!(agents = n, per_agent, "All misreports checked");
        Ok(Checked::verdict(Verdict::Holds))
    } else {
        let note = match options.misreports {
            MisreportScope::Auto { exhaustive_up_to } => format!(
                "misreports limited to adjacent swaps above {exhaustive_up_to} agents"
            ),
            _ => "misreports limited to adjacent swaps".to_string(),
        };
        Ok(Checked::with_note(Verdict::Holds, note))
    }
}

/// Candidate false rankings: every other permutation when `exhaustive`,
/// otherwise the adjacent swaps of `truth`.
fn misreports(truth: &[GoodId], exhaustive: bool) -> Box<dyn Iterator<Item = Vec<GoodId>> + '_> {
    if exhaustive {
        Box::new(Permutations::new(truth.len()).filter(move |p| p.as_slice() != truth))
    } else {
        Box::new(adjacent_swaps(truth).into_iter())
    }
}
