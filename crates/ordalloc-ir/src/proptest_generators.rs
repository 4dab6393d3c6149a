//! Proptest strategies for generating valid profiles and assignments.

use proptest::prelude::*;

use crate::assignment::{Assignment, PermutationAssignment, Tolerance};
use crate::profile::{GoodId, PreferenceProfile};

/// Strategy for a strict ranking of `n` goods.
pub fn arb_ranking(n: usize) -> impl Strategy<Value = Vec<GoodId>> {
    Just((0..n).collect::<Vec<_>>()).prop_shuffle()
}

/// Strategy for a valid profile with `min_n..=max_n` agents.
pub fn arb_profile(min_n: usize, max_n: usize) -> impl Strategy<Value = PreferenceProfile> {
    (min_n.max(1)..=max_n.max(1))
        .prop_flat_map(|n| proptest::collection::vec(arb_ranking(n), n))
        .prop_map(|rankings| {
            PreferenceProfile::new(rankings).expect("shuffled rankings are always valid")
        })
}

/// Strategy for a permutation matrix of size `n`.
pub fn arb_permutation(n: usize) -> impl Strategy<Value = PermutationAssignment> {
    arb_ranking(n).prop_map(|goods| {
        PermutationAssignment::new(goods).expect("shuffled goods form a permutation")
    })
}

/// Strategy for a doubly-stochastic matrix of size `min_n..=max_n`.
///
/// Built as a convex combination of 1-4 random permutation matrices with
/// integer weights, which covers both sparse and dense supports.
pub fn arb_doubly_stochastic(min_n: usize, max_n: usize) -> impl Strategy<Value = Assignment> {
    (min_n.max(1)..=max_n.max(1))
        .prop_flat_map(|n| {
            proptest::collection::vec((arb_permutation(n), 1u32..=10), 1..=4)
                .prop_map(move |terms| (n, terms))
        })
        .prop_map(|(n, terms)| {
            let total: f64 = terms.iter().map(|(_, w)| f64::from(*w)).sum();
            let mut probs = vec![vec![0.0; n]; n];
            for (perm, weight) in &terms {
                let w = f64::from(*weight) / total;
                for (agent, row) in probs.iter_mut().enumerate() {
                    row[perm.good_of(agent)] += w;
                }
            }
            Assignment::new(probs, &Tolerance::default())
                .expect("mixtures of permutations are doubly stochastic")
        })
}
