//! Envy-freeness by pairwise stochastic dominance.

use ordalloc_ir::dominance::{compare, cumulative};
use ordalloc_ir::{Assignment, PreferenceProfile, SdRelation, Tolerance};

use super::Checked;
use crate::counterexample::Counterexample;
use crate::result::Verdict;

/// Compare every agent's lottery with every other agent's lottery under the
/// first agent's ranking, envier-major in ascending order, and report the
/// first pair where the other lottery dominates.
pub(crate) fn check(
    profile: &PreferenceProfile,
    assignment: &Assignment,
    tolerance: &Tolerance,
) -> Checked {
    match find_envy(profile, assignment, tolerance.epsilon) {
        Some(counterexample) => Checked::verdict(Verdict::Fails { counterexample }),
        None => Checked::verdict(Verdict::Holds),
    }
}

/// The first envious pair, if any.
pub fn find_envy(
    profile: &PreferenceProfile,
    assignment: &Assignment,
    epsilon: f64,
) -> Option<Counterexample> {
    let n = profile.num_agents();
    for envier in 0..n {
        let ranking = profile.ranking(envier);
        let own = assignment.row(envier);
        for envied in (0..n).filter(|&j| j != envier) {
            let other = assignment.row(envied);
            if let SdRelation::DominatedBy { prefix } = compare(ranking, own, other, epsilon) {
                return Some(Counterexample::Envy {
                    envier,
                    envied,
                    prefix,
                    envier_cumulative: cumulative(ranking, own)[prefix - 1],
                    envied_cumulative: cumulative(ranking, other)[prefix - 1],
                });
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordalloc_ir::PermutationAssignment;

    #[test]
    fn uniform_lottery_is_envy_free() {
        let p = PreferenceProfile::new(vec![vec![0, 1], vec![0, 1]]).unwrap();
        let a = Assignment::new(vec![vec![0.5, 0.5], vec![0.5, 0.5]], &Tolerance::default())
            .unwrap();
        assert!(find_envy(&p, &a, 1e-9).is_none());
    }

    #[test]
    fn deterministic_split_of_a_common_favourite_is_envious() {
        let p = PreferenceProfile::new(vec![vec![0, 1], vec![0, 1]]).unwrap();
        let a = PermutationAssignment::new(vec![1, 0]).unwrap().to_assignment();
        assert_eq!(
            find_envy(&p, &a, 1e-9),
            Some(Counterexample::Envy {
                envier: 0,
                envied: 1,
                prefix: 1,
                envier_cumulative: 0.0,
                envied_cumulative: 1.0,
            })
        );
    }

    #[test]
    fn incomparable_lotteries_are_not_envy() {
        // a1 gets its middle good for sure; a2 gets a 50/50 of best and worst.
        let p = PreferenceProfile::new(vec![vec![0, 1, 2], vec![0, 1, 2], vec![2, 1, 0]])
            .unwrap();
        let a = Assignment::new(
            vec![
                vec![0.0, 1.0, 0.0],
                vec![0.5, 0.0, 0.5],
                vec![0.5, 0.0, 0.5],
            ],
            &Tolerance::default(),
        )
        .unwrap();
        assert!(find_envy(&p, &a, 1e-9).is_none());
    }
}
