//! Hand-computed scenarios for the three mechanisms and the four checks.

mod common;

use common::{
    assert_doubly_stochastic, assert_rows_close, bogomolnaia_moulin, init_tracing, profile,
    three_agents,
};
use num::rational::BigRational;
use num::BigInt;
use ordalloc_engine::config::{RandomPriorityOptions, SearchBudget};
use ordalloc_engine::counterexample::CycleTrade;
use ordalloc_engine::mechanism::probabilistic_serial::ProbabilisticSerial;
use ordalloc_engine::mechanism::random_priority::RandomPriority;
use ordalloc_engine::mechanism::Exactness;
use ordalloc_engine::{
    evaluate_mechanism, run_mechanism, verify, Counterexample, EngineOptions, MechanismKind,
    Property, PropertyVerifier, Verdict,
};
use ordalloc_ir::PreferenceProfile;

fn ratio(n: i64, d: i64) -> BigRational {
    BigRational::new(BigInt::from(n), BigInt::from(d))
}

#[test]
fn probabilistic_serial_three_agent_schedule() {
    init_tracing();
    let p = three_agents();
    let run = ProbabilisticSerial::default().eat(&p);
    let times: Vec<BigRational> = run.events.iter().map(|e| e.time.clone()).collect();
    assert_eq!(times, vec![ratio(1, 2), ratio(2, 3), ratio(1, 1)]);
    assert_eq!(run.events[0].exhausted, vec![0]);
    assert_eq!(run.shares[2][1], ratio(2, 3));

    let outcome =
        run_mechanism(MechanismKind::ProbabilisticSerial, &p, &EngineOptions::default()).unwrap();
    assert_doubly_stochastic(&outcome.assignment);
    assert_rows_close(
        &outcome.assignment,
        &[
            &[0.5, 1.0 / 6.0, 1.0 / 3.0],
            &[0.5, 1.0 / 6.0, 1.0 / 3.0],
            &[0.0, 2.0 / 3.0, 1.0 / 3.0],
        ],
    );
}

#[test]
fn random_priority_matches_probabilistic_serial_on_three_agents() {
    init_tracing();
    let p = three_agents();
    let options = EngineOptions::default();
    let rp = run_mechanism(MechanismKind::RandomPriority, &p, &options).unwrap();
    let ps = run_mechanism(MechanismKind::ProbabilisticSerial, &p, &options).unwrap();
    assert_eq!(rp.exactness, Exactness::Exact);
    assert!(rp.assignment.max_abs_diff(&ps.assignment) < 1e-9);
}

#[test]
fn popular_assignment_produces_envy() {
    init_tracing();
    let p = three_agents();
    let options = EngineOptions::default();
    let outcome = run_mechanism(MechanismKind::PopularAssignment, &p, &options).unwrap();
    assert_rows_close(
        &outcome.assignment,
        &[&[1.0, 0.0, 0.0], &[0.0, 0.0, 1.0], &[0.0, 1.0, 0.0]],
    );

    let report = PropertyVerifier::new(options)
        .no_envy(&p, &outcome.assignment)
        .unwrap();
    assert_eq!(
        report.counterexample(),
        Some(&Counterexample::Envy {
            envier: 1,
            envied: 0,
            prefix: 1,
            envier_cumulative: 0.0,
            envied_cumulative: 1.0,
        })
    );
}

#[test]
fn random_priority_is_strategy_proof_on_every_misreport() {
    init_tracing();
    let p = three_agents();
    let report = PropertyVerifier::default()
        .strategy_proofness(&p, &RandomPriority::default())
        .unwrap();
    assert_eq!(report.verdict, Verdict::Holds);
    assert!(report.note.is_none());
    assert!(report.counterexample().is_none());
}

#[test]
fn random_priority_is_not_ordinally_efficient_on_mirrored_pairs() {
    init_tracing();
    let p = bogomolnaia_moulin();
    let options = EngineOptions::default();
    let rp = run_mechanism(MechanismKind::RandomPriority, &p, &options).unwrap();
    let (big, small) = (5.0 / 12.0, 1.0 / 12.0);
    assert_rows_close(
        &rp.assignment,
        &[
            &[big, small, big, small],
            &[big, small, big, small],
            &[small, big, small, big],
            &[small, big, small, big],
        ],
    );

    let report = PropertyVerifier::new(options)
        .ordinal_efficiency(&p, &rp.assignment)
        .unwrap();
    match report.counterexample() {
        Some(Counterexample::ImprovingCycle { trades, amount, .. }) => {
            assert_eq!(
                trades,
                &vec![
                    CycleTrade {
                        agent: 2,
                        gives: 0,
                        receives: 1
                    },
                    CycleTrade {
                        agent: 0,
                        gives: 1,
                        receives: 0
                    },
                ]
            );
            assert!((amount - small).abs() < 1e-9);
        }
        other => panic!("expected an improving cycle, got {other:?}"),
    }

    let ps = run_mechanism(MechanismKind::ProbabilisticSerial, &p, &options).unwrap();
    assert_rows_close(
        &ps.assignment,
        &[
            &[0.5, 0.0, 0.5, 0.0],
            &[0.5, 0.0, 0.5, 0.0],
            &[0.0, 0.5, 0.0, 0.5],
            &[0.0, 0.5, 0.0, 0.5],
        ],
    );
    let reports = verify(&p, &ps.assignment, None, &options).unwrap();
    assert!(reports[..3].iter().all(|r| r.is_holds()), "{reports:?}");
}

#[test]
fn labelled_profile_end_to_end() {
    init_tracing();
    let p = PreferenceProfile::from_labelled(
        &["Ann", "Bob", "Cat"],
        &["cake", "pie", "tart"],
        &[
            vec!["cake", "pie", "tart"],
            vec!["cake", "pie", "tart"],
            vec!["pie", "cake", "tart"],
        ],
    )
    .unwrap();
    let evaluation =
        evaluate_mechanism(MechanismKind::PopularAssignment, &p, &EngineOptions::default())
            .unwrap();
    assert_eq!(evaluation.outcome.mechanism, "Popular");
    assert_eq!(evaluation.overall_verdict(), "fails");

    let envy = &evaluation.reports[2];
    assert_eq!(envy.property, Property::NoEnvy);
    let text = envy.describe(p.labels());
    assert!(text.contains("Bob envies Ann"), "{text}");
    assert_eq!(
        evaluation.outcome.assignment.describe_agent(0, p.labels()),
        "Ann receives 100.00% of cake"
    );
}

#[test]
fn exhausted_budget_leaves_properties_undetermined() {
    init_tracing();
    let options = EngineOptions {
        budget: SearchBudget::with_max_steps(1),
        ..EngineOptions::default()
    };
    let evaluation =
        evaluate_mechanism(MechanismKind::RandomPriority, &three_agents(), &options).unwrap();
    let strategy = &evaluation.reports[3];
    assert_eq!(strategy.property, Property::StrategyProofness);
    assert!(matches!(strategy.verdict, Verdict::Undetermined { .. }));
    assert_ne!(evaluation.overall_verdict(), "holds");
}

#[test]
fn large_profiles_fall_back_to_seeded_sampling() {
    init_tracing();
    let n = 5;
    let rankings: Vec<Vec<usize>> = (0..n)
        .map(|i| (0..n).map(|k| (i + k) % n).collect())
        .collect();
    let refs: Vec<&[usize]> = rankings.iter().map(Vec::as_slice).collect();
    let p = profile(&refs);
    let options = EngineOptions {
        random_priority: RandomPriorityOptions {
            exact_threshold: 3,
            sampling_trials: 500,
            seed: 7,
        },
        ..EngineOptions::default()
    };
    let first = run_mechanism(MechanismKind::RandomPriority, &p, &options).unwrap();
    let second = run_mechanism(MechanismKind::RandomPriority, &p, &options).unwrap();
    assert_eq!(
        first.exactness,
        Exactness::Sampled {
            trials: 500,
            seed: 7
        }
    );
    assert_eq!(first.assignment, second.assignment);
    assert_doubly_stochastic(&first.assignment);
    // Distinct favourites: every order gives everyone their top good.
    for agent in 0..n {
        assert_eq!(first.assignment.get(agent, agent), 1.0);
    }
}
