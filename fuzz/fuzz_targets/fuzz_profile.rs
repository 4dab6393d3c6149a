#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary rankings must be rejected with an error, never a panic.
    let n = data.first().map_or(0, |b| usize::from(b % 8));
    let rankings: Vec<Vec<usize>> = data
        .get(1..)
        .unwrap_or_default()
        .chunks(n.max(1))
        .take(n)
        .map(|chunk| chunk.iter().map(|b| usize::from(b % 9)).collect())
        .collect();
    let _ = ordalloc_engine::build_profile(rankings);
});
