#![no_main]
use libfuzzer_sys::fuzz_target;

use ordalloc_engine::{run_mechanism, EngineOptions, MechanismError, MechanismKind};
use ordalloc_ir::PreferenceProfile;
use ordalloc_prob::BirkhoffDecomposer;

/// Decode a valid profile: the first byte picks `n`, then each agent's
/// ranking is built by repeatedly picking among the remaining goods.
fn profile_from_bytes(data: &[u8]) -> Option<PreferenceProfile> {
    let (&first, rest) = data.split_first()?;
    let n = usize::from(first % 5) + 1;
    let mut bytes = rest.iter().copied().cycle();
    let rankings = (0..n)
        .map(|_| {
            let mut remaining: Vec<usize> = (0..n).collect();
            let mut ranking = Vec::with_capacity(n);
            while !remaining.is_empty() {
                let pick = usize::from(bytes.next().unwrap_or(0)) % remaining.len();
                ranking.push(remaining.remove(pick));
            }
            ranking
        })
        .collect();
    PreferenceProfile::new(rankings).ok()
}

fuzz_target!(|data: &[u8]| {
    let Some(profile) = profile_from_bytes(data) else {
        return;
    };
    let options = EngineOptions::default();
    for kind in MechanismKind::ALL {
        // Every mechanism output must be decomposable. Round and pivot limits
        // are reported errors, not crashes.
        match run_mechanism(kind, &profile, &options) {
            Ok(outcome) => {
                let decomposition = BirkhoffDecomposer::new(options.tolerance)
                    .decompose(&outcome.assignment)
                    .unwrap();
                assert!(decomposition.describes(&outcome.assignment, &options.tolerance));
            }
            Err(MechanismError::NoPopularAssignmentExists { partial, .. }) => {
                assert_eq!(kind, MechanismKind::PopularAssignment);
                assert!(partial.is_some());
            }
            Err(_) => {}
        }
    }
});
