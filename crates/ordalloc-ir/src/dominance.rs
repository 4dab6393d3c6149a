//! First-order stochastic dominance between lotteries over goods.

use serde::{Deserialize, Serialize};

use crate::profile::GoodId;

/// Outcome of comparing lottery `x` against lottery `y` under one ranking.
///
/// Prefixes are 1-based: `prefix = k` refers to the agent's top `k` goods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "relation", rename_all = "snake_case")]
pub enum SdRelation {
    /// Cumulative probabilities agree at every prefix.
    Equivalent,
    /// `x` is weakly ahead everywhere and strictly ahead first at `prefix`.
    Dominates { prefix: usize },
    /// `y` is weakly ahead everywhere and strictly ahead first at `prefix`.
    DominatedBy { prefix: usize },
    /// Each lottery is strictly ahead somewhere.
    Incomparable { x_ahead_at: usize, y_ahead_at: usize },
}

impl SdRelation {
    pub fn x_dominates(&self) -> bool {
        matches!(self, SdRelation::Dominates { .. })
    }

    pub fn y_dominates(&self) -> bool {
        matches!(self, SdRelation::DominatedBy { .. })
    }
}

/// Cumulative probability of `lottery` on each prefix of `ranking`.
///
/// `result[k - 1]` is the mass on the top `k` goods.
pub fn cumulative(ranking: &[GoodId], lottery: &[f64]) -> Vec<f64> {
    ranking
        .iter()
        .scan(0.0, |acc, &good| {
            *acc += lottery[good];
            Some(*acc)
        })
        .collect()
}

/// Compare two lotteries by first-order stochastic dominance under `ranking`.
///
/// Differences of at most `epsilon` at a prefix count as ties.
pub fn compare(ranking: &[GoodId], x: &[f64], y: &[f64], epsilon: f64) -> SdRelation {
    let cx = cumulative(ranking, x);
    let cy = cumulative(ranking, y);
    let mut x_ahead = None;
    let mut y_ahead = None;
    for (k, (a, b)) in cx.iter().zip(&cy).enumerate() {
        if a - b > epsilon && x_ahead.is_none() {
            x_ahead = Some(k + 1);
        }
        if b - a > epsilon && y_ahead.is_none() {
            y_ahead = Some(k + 1);
        }
    }
    match (x_ahead, y_ahead) {
        (None, None) => SdRelation::Equivalent,
        (Some(prefix), None) => SdRelation::Dominates { prefix },
        (None, Some(prefix)) => SdRelation::DominatedBy { prefix },
        (Some(x_ahead_at), Some(y_ahead_at)) => SdRelation::Incomparable {
            x_ahead_at,
            y_ahead_at,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn cumulative_follows_ranking_order() {
        let c = cumulative(&[2, 0, 1], &[0.25, 0.25, 0.5]);
        assert_eq!(c, vec![0.5, 0.75, 1.0]);
    }

    #[test]
    fn shifting_mass_upward_dominates() {
        let ranking = [0, 1, 2];
        let better = [0.5, 0.5, 0.0];
        let worse = [0.5, 0.0, 0.5];
        assert_eq!(
            compare(&ranking, &better, &worse, EPS),
            SdRelation::Dominates { prefix: 2 }
        );
        assert_eq!(
            compare(&ranking, &worse, &better, EPS),
            SdRelation::DominatedBy { prefix: 2 }
        );
    }

    #[test]
    fn identical_lotteries_are_equivalent() {
        let ranking = [1, 0];
        assert_eq!(
            compare(&ranking, &[0.3, 0.7], &[0.3, 0.7], EPS),
            SdRelation::Equivalent
        );
    }

    #[test]
    fn crossing_cumulatives_are_incomparable() {
        let ranking = [0, 1, 2];
        // x: more of the best and the worst; y: all middle.
        let x = [0.5, 0.0, 0.5];
        let y = [0.0, 1.0, 0.0];
        assert_eq!(
            compare(&ranking, &x, &y, EPS),
            SdRelation::Incomparable {
                x_ahead_at: 1,
                y_ahead_at: 2
            }
        );
    }

    #[test]
    fn differences_below_epsilon_are_ties() {
        let ranking = [0, 1];
        assert_eq!(
            compare(&ranking, &[0.5 + 1e-12, 0.5 - 1e-12], &[0.5, 0.5], EPS),
            SdRelation::Equivalent
        );
    }
}
