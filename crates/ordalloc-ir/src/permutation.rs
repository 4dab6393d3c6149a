//! Bounded-stack enumeration of permutations.
//!
//! Exhaustive checks walk all `n!` orderings; the iterator here advances in
//! place with the classical next-lexicographic-permutation step, so memory is
//! `O(n)` regardless of how many permutations are visited.

/// Iterator over every permutation of `0..n` in lexicographic order, starting
/// at the identity.
#[derive(Debug, Clone)]
pub struct Permutations {
    current: Option<Vec<usize>>,
}

impl Permutations {
    pub fn new(n: usize) -> Self {
        Self {
            current: Some((0..n).collect()),
        }
    }
}

impl Iterator for Permutations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        let current = self.current.take()?;
        let mut successor = current.clone();
        if next_permutation(&mut successor) {
            self.current = Some(successor);
        }
        Some(current)
    }
}

/// Advance `perm` to its lexicographic successor.
///
/// Returns `false` (leaving `perm` unchanged) when `perm` is already the last
/// permutation.
pub fn next_permutation(perm: &mut [usize]) -> bool {
    let n = perm.len();
    if n < 2 {
        return false;
    }
    let mut i = n - 1;
    while i > 0 && perm[i - 1] >= perm[i] {
        i -= 1;
    }
    if i == 0 {
        return false;
    }
    let pivot = i - 1;
    let mut j = n - 1;
    while perm[j] <= perm[pivot] {
        j -= 1;
    }
    perm.swap(pivot, j);
    perm[i..].reverse();
    true
}

/// `n!`, or `None` if it does not fit in a `u64`.
pub fn factorial(n: usize) -> Option<u64> {
    (1..=n as u64).try_fold(1u64, |acc, k| acc.checked_mul(k))
}

/// Every ranking obtained from `ranking` by swapping one adjacent pair.
pub fn adjacent_swaps(ranking: &[usize]) -> Vec<Vec<usize>> {
    (0..ranking.len().saturating_sub(1))
        .map(|i| {
            let mut swapped = ranking.to_vec();
            swapped.swap(i, i + 1);
            swapped
        })
        .collect()
}
