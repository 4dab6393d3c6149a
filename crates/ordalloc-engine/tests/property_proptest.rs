//! Randomized invariants over mechanisms and checks.

mod common;

use common::{assert_doubly_stochastic, proptest_config};
use ordalloc_engine::budget::BudgetMeter;
use ordalloc_engine::mechanism::popular::majority_vote;
use ordalloc_engine::verify::envy::find_envy;
use ordalloc_engine::verify::ordinal::find_improving_cycle;
use ordalloc_engine::{
    run_mechanism, EngineOptions, MechanismError, MechanismKind, MechanismOutcome,
    PropertyVerifier,
};
use ordalloc_ir::permutation::Permutations;
use ordalloc_ir::proptest_generators::{arb_doubly_stochastic, arb_profile};
use ordalloc_ir::{Assignment, GoodId, PermutationAssignment, PreferenceProfile, Tolerance};
use proptest::prelude::*;

/// Agents pick in `order`, each taking its best remaining good.
fn picking_sequence(profile: &PreferenceProfile, order: &[usize]) -> Vec<GoodId> {
    let n = profile.num_agents();
    let mut taken = vec![false; n];
    let mut goods = vec![0; n];
    for &agent in order {
        let pick = profile
            .ranking(agent)
            .iter()
            .copied()
            .find(|&good| !taken[good])
            .unwrap_or_else(|| panic!("agent {agent} found nothing left"));
        taken[pick] = true;
        goods[agent] = pick;
    }
    goods
}

fn defeated_by_some_matching(profile: &PreferenceProfile, assignment: &Assignment) -> bool {
    Permutations::new(profile.num_agents()).any(|goods| {
        let challenger = PermutationAssignment::new(goods).unwrap().to_assignment();
        majority_vote(profile, assignment, &challenger, 1e-9).x_defeated()
    })
}

/// The outcome, or `None` when Popular reports that nothing is popular.
fn served(
    kind: MechanismKind,
    profile: &PreferenceProfile,
    options: &EngineOptions,
) -> Option<MechanismOutcome> {
    match run_mechanism(kind, profile, options) {
        Ok(outcome) => Some(outcome),
        Err(MechanismError::NoPopularAssignmentExists { .. })
            if kind == MechanismKind::PopularAssignment =>
        {
            None
        }
        Err(e) => panic!("{kind} failed: {e}"),
    }
}

proptest! {
    #![proptest_config(proptest_config(file!()))]

    #[test]
    fn every_mechanism_outputs_a_doubly_stochastic_matrix(profile in arb_profile(1, 4)) {
        let options = EngineOptions::default();
        for kind in MechanismKind::ALL {
            if let Some(outcome) = served(kind, &profile, &options) {
                assert_doubly_stochastic(&outcome.assignment);
            }
        }
    }

    #[test]
    fn exact_random_priority_is_the_serial_dictatorship_mean(profile in arb_profile(1, 6)) {
        let n = profile.num_agents();
        let options = EngineOptions::default();
        let outcome = run_mechanism(MechanismKind::RandomPriority, &profile, &options).unwrap();
        prop_assert!(outcome.exactness.is_exact());

        let mut sums = vec![vec![0.0f64; n]; n];
        let mut orders = 0.0;
        for order in Permutations::new(n) {
            orders += 1.0;
            for (agent, good) in picking_sequence(&profile, &order).into_iter().enumerate() {
                sums[agent][good] += 1.0;
            }
        }
        for (agent, row) in sums.iter().enumerate() {
            for (good, &count) in row.iter().enumerate() {
                let mean = count / orders;
                prop_assert!((outcome.assignment.get(agent, good) - mean).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn probabilistic_serial_is_ordinally_efficient_and_envy_free(profile in arb_profile(1, 6)) {
        let options = EngineOptions::default();
        let outcome =
            run_mechanism(MechanismKind::ProbabilisticSerial, &profile, &options).unwrap();
        let tolerance = Tolerance::default();
        let mut meter = BudgetMeter::unlimited();
        let cycle =
            find_improving_cycle(&profile, &outcome.assignment, &tolerance, &mut meter).unwrap();
        prop_assert!(cycle.is_none(), "{cycle:?}");
        let envy = find_envy(&profile, &outcome.assignment, tolerance.epsilon);
        prop_assert!(envy.is_none(), "{envy:?}");
    }

    #[test]
    fn ordinally_efficient_outputs_are_ex_post_efficient(profile in arb_profile(1, 4)) {
        let options = EngineOptions::default();
        let verifier = PropertyVerifier::new(options);
        for kind in [MechanismKind::ProbabilisticSerial, MechanismKind::PopularAssignment] {
            let Some(outcome) = served(kind, &profile, &options) else {
                continue;
            };
            if verifier.ordinal_efficiency(&profile, &outcome.assignment).unwrap().is_holds() {
                let report = verifier.ex_post_efficiency(&profile, &outcome.assignment).unwrap();
                prop_assert!(report.is_holds(), "{kind}: {report}");
            }
        }
    }

    #[test]
    fn popular_outcomes_beat_every_matching_or_are_reported(profile in arb_profile(1, 4)) {
        let options = EngineOptions::default();
        match run_mechanism(MechanismKind::PopularAssignment, &profile, &options) {
            Ok(outcome) => {
                prop_assert!(!defeated_by_some_matching(&profile, &outcome.assignment));
            }
            Err(MechanismError::NoPopularAssignmentExists { best_margin, partial }) => {
                prop_assert!(best_margin > 0.0);
                let partial = partial.expect("a failed search reports its best candidate");
                prop_assert!(defeated_by_some_matching(&profile, &partial));
            }
            Err(e) => prop_assert!(false, "unexpected error {e}"),
        }
    }

    #[test]
    fn rounded_assignments_get_an_ex_post_verdict(
        (profile, assignment) in (2usize..=4).prop_flat_map(|n| {
            (arb_profile(n, n), arb_doubly_stochastic(n, n))
        }),
        digits in 3i32..=7,
    ) {
        let scale = 10f64.powi(digits);
        let rounded: Vec<Vec<f64>> = assignment
            .rows()
            .iter()
            .map(|row| row.iter().map(|p| (p * scale).round() / scale).collect())
            .collect();
        let tolerance = Tolerance::default();
        let Ok(rounded) = Assignment::new(rounded, &tolerance) else {
            return Ok(());
        };
        let verifier = PropertyVerifier::new(EngineOptions::default());
        let report = verifier.ex_post_efficiency(&profile, &rounded);
        prop_assert!(report.is_ok(), "{:?}", report.err());
    }
}
