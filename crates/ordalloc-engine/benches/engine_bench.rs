use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ordalloc_engine::{
    evaluate_mechanism, run_mechanism, EngineOptions, MechanismKind, PropertyVerifier,
};
use ordalloc_ir::PreferenceProfile;

/// `n` agents, each ranking goods cyclically from a shifted start, with the
/// first half sharing a favourite so the mechanisms have contention.
fn contested_profile(n: usize) -> PreferenceProfile {
    let rankings = (0..n)
        .map(|i| {
            let start = if i < n / 2 { 0 } else { i };
            (0..n).map(|k| (start + k) % n).collect()
        })
        .collect();
    PreferenceProfile::new(rankings).unwrap()
}

// ---------------------------------------------------------------------------
// Mechanisms
// ---------------------------------------------------------------------------

fn bench_mechanisms_n6(c: &mut Criterion) {
    let profile = contested_profile(6);
    let options = EngineOptions::default();
    for kind in MechanismKind::ALL {
        c.bench_function(&format!("mechanism_{kind}_n6"), |b| {
            b.iter(|| run_mechanism(kind, black_box(&profile), &options).ok())
        });
    }
}

fn bench_probabilistic_serial_n30(c: &mut Criterion) {
    let profile = contested_profile(30);
    let options = EngineOptions::default();
    c.bench_function("mechanism_probabilistic_serial_n30", |b| {
        b.iter(|| {
            run_mechanism(
                MechanismKind::ProbabilisticSerial,
                black_box(&profile),
                &options,
            )
            .unwrap()
        })
    });
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

fn bench_verify_random_priority_n5(c: &mut Criterion) {
    let profile = contested_profile(5);
    let options = EngineOptions::default();
    let outcome = run_mechanism(MechanismKind::RandomPriority, &profile, &options).unwrap();
    let verifier = PropertyVerifier::new(options);
    c.bench_function("verify_ordinal_efficiency_n5", |b| {
        b.iter(|| {
            verifier
                .ordinal_efficiency(black_box(&profile), &outcome.assignment)
                .unwrap()
        })
    });
    c.bench_function("verify_ex_post_efficiency_n5", |b| {
        b.iter(|| {
            verifier
                .ex_post_efficiency(black_box(&profile), &outcome.assignment)
                .unwrap()
        })
    });
}

fn bench_evaluate_n4(c: &mut Criterion) {
    let profile = contested_profile(4);
    let options = EngineOptions::default();
    c.bench_function("evaluate_probabilistic_serial_n4", |b| {
        b.iter(|| {
            evaluate_mechanism(
                MechanismKind::ProbabilisticSerial,
                black_box(&profile),
                &options,
            )
            .unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_mechanisms_n6,
    bench_probabilistic_serial_n30,
    bench_verify_random_priority_n5,
    bench_evaluate_n4,
);
criterion_main!(benches);
