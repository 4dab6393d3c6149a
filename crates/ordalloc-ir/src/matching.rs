//! Perfect matchings in the agent/good bipartite graph.

use num::rational::BigRational;
use num::traits::Zero;

use crate::profile::{AgentId, GoodId};

/// Find a perfect matching using only edges where `support[agent][good]` is true.
///
/// Augmenting-path search (Kuhn). Agents and goods are tried in ascending
/// order, so the result is deterministic. Returns `goods[agent]`.
pub fn perfect_matching(support: &[Vec<bool>]) -> Option<Vec<GoodId>> {
    let n = support.len();
    let mut owner: Vec<Option<AgentId>> = vec![None; n];
    for agent in 0..n {
        let mut visited = vec![false; n];
        if !augment(agent, support, &mut owner, &mut visited) {
            return None;
        }
    }
    let mut goods = vec![0; n];
    for (good, agent) in owner.iter().enumerate() {
        goods[(*agent)?] = good;
    }
    Some(goods)
}

fn augment(
    agent: AgentId,
    support: &[Vec<bool>],
    owner: &mut [Option<AgentId>],
    visited: &mut [bool],
) -> bool {
    for good in 0..support.len() {
        if !support[agent][good] || visited[good] {
            continue;
        }
        visited[good] = true;
        let free = match owner[good] {
            None => true,
            Some(holder) => augment(holder, support, owner, visited),
        };
        if free {
            owner[good] = Some(agent);
            return true;
        }
    }
    false
}

/// Minimum-cost perfect matching on a square cost matrix (Hungarian method
/// with potentials, `O(n^3)`), in exact rational arithmetic.
///
/// Returns `(goods, total_cost)` with `goods[agent]`, or `None` if the matrix
/// is empty or not square.
pub fn min_cost_perfect_matching(cost: &[Vec<BigRational>]) -> Option<(Vec<GoodId>, BigRational)> {
    let n = cost.len();
    if n == 0 || cost.iter().any(|row| row.len() != n) {
        return None;
    }
    // 1-based arrays; column 0 is the virtual root of each search.
    let mut u = vec![BigRational::zero(); n + 1];
    let mut v = vec![BigRational::zero(); n + 1];
    let mut row_of_col = vec![0usize; n + 1];
    let mut way = vec![0usize; n + 1];

    for row in 1..=n {
        row_of_col[0] = row;
        let mut col0 = 0usize;
        let mut minv: Vec<Option<BigRational>> = vec![None; n + 1];
        let mut used = vec![false; n + 1];
        loop {
            used[col0] = true;
            let row0 = row_of_col[col0];
            let mut delta: Option<BigRational> = None;
            let mut col1 = 0usize;
            for col in 1..=n {
                if used[col] {
                    continue;
                }
                let reduced = &cost[row0 - 1][col - 1] - &u[row0] - &v[col];
                if minv[col].as_ref().map_or(true, |m| reduced < *m) {
                    minv[col] = Some(reduced);
                    way[col] = col0;
                }
                if let Some(m) = &minv[col] {
                    if delta.as_ref().map_or(true, |d| m < d) {
                        delta = Some(m.clone());
                        col1 = col;
                    }
                }
            }
            let delta = delta?;
            for col in 0..=n {
                if used[col] {
                    u[row_of_col[col]] += &delta;
                    v[col] -= &delta;
                } else if let Some(m) = minv[col].as_mut() {
                    *m -= &delta;
                }
            }
            col0 = col1;
            if row_of_col[col0] == 0 {
                break;
            }
        }
        loop {
            let col1 = way[col0];
            row_of_col[col0] = row_of_col[col1];
            col0 = col1;
            if col0 == 0 {
                break;
            }
        }
    }

    let mut goods = vec![0; n];
    for col in 1..=n {
        goods[row_of_col[col] - 1] = col - 1;
    }
    let total = goods
        .iter()
        .enumerate()
        .fold(BigRational::zero(), |acc, (agent, &good)| {
            acc + &cost[agent][good]
        });
    Some((goods, total))
}
