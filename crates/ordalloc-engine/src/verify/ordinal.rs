//! Ordinal efficiency via improving cycles.
//!
//! Goods form a directed graph with an edge `g -> h` whenever some agent
//! holding positive probability of `g` ranks `h` above `g`. An assignment is
//! ordinally efficient exactly when this graph is acyclic: along a cycle each
//! labelled agent can swap a little of `g` for `h`, which keeps the matrix
//! doubly stochastic and makes every trader strictly better off.

use std::collections::VecDeque;

use ordalloc_ir::{AgentId, Assignment, GoodId, PreferenceProfile, Tolerance};

use super::{Checked, VerifyError};
use crate::budget::BudgetMeter;
use crate::counterexample::{Counterexample, CycleTrade, ImprovedRow};
use crate::result::Verdict;

pub(crate) fn check(
    profile: &PreferenceProfile,
    assignment: &Assignment,
    tolerance: &Tolerance,
    meter: &mut BudgetMeter,
) -> Result<Checked, VerifyError> {
    Ok(
        match find_improving_cycle(profile, assignment, tolerance, meter)? {
            Some(counterexample) => Checked::verdict(Verdict::Fails { counterexample }),
            None => Checked::verdict(Verdict::Holds),
        },
    )
}

/// `labels[g][h]`: the lowest-indexed agent witnessing the edge `g -> h`.
fn trade_graph(
    profile: &PreferenceProfile,
    assignment: &Assignment,
    tolerance: &Tolerance,
) -> Vec<Vec<Option<AgentId>>> {
    let n = profile.num_goods();
    let mut labels = vec![vec![None; n]; n];
    for agent in 0..profile.num_agents() {
        let ranking = profile.ranking(agent);
        for (pos, &g) in ranking.iter().enumerate() {
            if !tolerance.is_positive(assignment.get(agent, g)) {
                continue;
            }
            for &h in &ranking[..pos] {
                labels[g][h].get_or_insert(agent);
            }
        }
    }
    labels
}

/// The shortest improving cycle, ties going to the lowest starting good.
///
/// Runs one breadth-first search per good, charging one budget step per
/// expanded node.
pub fn find_improving_cycle(
    profile: &PreferenceProfile,
    assignment: &Assignment,
    tolerance: &Tolerance,
    meter: &mut BudgetMeter,
) -> Result<Option<Counterexample>, VerifyError> {
    let n = profile.num_goods();
    let labels = trade_graph(profile, assignment, tolerance);

    let mut best: Option<Vec<GoodId>> = None;
    for start in 0..n {
        let mut parent: Vec<Option<GoodId>> = vec![None; n];
        let mut depth: Vec<Option<usize>> = vec![None; n];
        depth[start] = Some(0);
        let mut queue = VecDeque::from([start]);
        while let Some(u) = queue.pop_front() {
            meter.tick()?;
            let d = depth[u].unwrap_or(0);
            if best.as_ref().is_some_and(|b| d + 1 >= b.len()) {
                break;
            }
            if labels[u][start].is_some() {
                let mut cycle = vec![u];
                let mut node = u;
                while let Some(p) = parent[node] {
                    cycle.push(p);
                    node = p;
                }
                cycle.reverse();
                best = Some(cycle);
                break;
            }
            for h in 0..n {
                if labels[u][h].is_some() && depth[h].is_none() {
                    depth[h] = Some(d + 1);
                    parent[h] = Some(u);
                    queue.push_back(h);
                }
            }
        }
    }

    let Some(cycle) = best else {
        return Ok(None);
    };
    let trades: Vec<CycleTrade> = cycle
        .iter()
        .enumerate()
        .filter_map(|(k, &gives)| {
            let receives = cycle[(k + 1) % cycle.len()];
            labels[gives][receives].map(|agent| CycleTrade {
                agent,
                gives,
                receives,
            })
        })
        .collect();
    let amount = trades
        .iter()
        .map(|t| assignment.get(t.agent, t.gives))
        .fold(f64::INFINITY, f64::min);

    let mut improved_rows: Vec<ImprovedRow> = Vec::new();
    for trade in &trades {
        let idx = match improved_rows.iter().position(|r| r.agent == trade.agent) {
            Some(idx) => idx,
            None => {
                let before = assignment.row(trade.agent).to_vec();
                improved_rows.push(ImprovedRow {
                    agent: trade.agent,
                    after: before.clone(),
                    before,
                });
                improved_rows.len() - 1
            }
        };
        improved_rows[idx].after[trade.gives] -= amount;
        improved_rows[idx].after[trade.receives] += amount;
    }

    Ok(Some(Counterexample::ImprovingCycle {
        trades,
        amount,
        improved_rows,
    }))
}
