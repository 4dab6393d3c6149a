use serde::{Deserialize, Serialize};
use std::fmt;

use ordalloc_ir::{AgentId, GoodId, Labels, PermutationAssignment};

/// One trade of an improving cycle: `agent` gives up some of `gives` and
/// receives the same amount of `receives`, which it ranks higher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleTrade {
    pub agent: AgentId,
    pub gives: GoodId,
    pub receives: GoodId,
}

/// An agent's lottery before and after a trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovedRow {
    pub agent: AgentId,
    pub before: Vec<f64>,
    pub after: Vec<f64>,
}

/// Evidence that a property fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Counterexample {
    /// A matching used with positive weight is Pareto-dominated, and the
    /// assignment has no decomposition avoiding dominated matchings.
    ParetoDominated {
        dominated: PermutationAssignment,
        dominating: PermutationAssignment,
        /// Weight of `dominated` in the decomposition that was checked.
        weight: f64,
        better_off: Vec<AgentId>,
    },
    /// Trading `amount` around the cycle makes every trader strictly better
    /// off and nobody worse off.
    ImprovingCycle {
        trades: Vec<CycleTrade>,
        amount: f64,
        improved_rows: Vec<ImprovedRow>,
    },
    /// `envier` prefers `envied`'s lottery: it is weakly ahead on every
    /// prefix of `envier`'s ranking and strictly ahead on the top `prefix`.
    Envy {
        envier: AgentId,
        envied: AgentId,
        prefix: usize,
        envier_cumulative: f64,
        envied_cumulative: f64,
    },
    /// Reporting `false_ranking` gives `agent` a lottery that dominates its
    /// truthful one under its true ranking, strictly from `prefix` on.
    Manipulation {
        agent: AgentId,
        false_ranking: Vec<GoodId>,
        truthful_row: Vec<f64>,
        manipulated_row: Vec<f64>,
        prefix: usize,
    },
}

impl Counterexample {
    /// Narrative using the names in `labels`.
    pub fn describe(&self, labels: &Labels) -> String {
        self.narrate(
            &|a: AgentId| labels.agents[a].clone(),
            &|g: GoodId| labels.goods[g].clone(),
        )
    }

    fn narrate(
        &self,
        agent: &dyn Fn(AgentId) -> String,
        good: &dyn Fn(GoodId) -> String,
    ) -> String {
        let matching = |p: &PermutationAssignment| {
            let pairs: Vec<String> = p
                .goods()
                .iter()
                .enumerate()
                .map(|(a, &g)| format!("{}->{}", agent(a), good(g)))
                .collect();
            format!("[{}]", pairs.join(", "))
        };
        match self {
            Counterexample::ParetoDominated {
                dominated,
                dominating,
                weight,
                better_off,
            } => {
                let agents: Vec<String> = better_off.iter().map(|&a| agent(a)).collect();
                format!(
                    "matching {} (weight {:.4}) is Pareto-dominated by {}; better off: {}",
                    matching(dominated),
                    weight,
                    matching(dominating),
                    agents.join(", ")
                )
            }
            Counterexample::ImprovingCycle { trades, amount, .. } => {
                let steps: Vec<String> = trades
                    .iter()
                    .map(|t| {
                        format!(
                            "{} trades {} for {}",
                            agent(t.agent),
                            good(t.gives),
                            good(t.receives)
                        )
                    })
                    .collect();
                format!(
                    "trading {:.4} around the cycle improves every trader: {}",
                    amount,
                    steps.join("; ")
                )
            }
            Counterexample::Envy {
                envier,
                envied,
                prefix,
                envier_cumulative,
                envied_cumulative,
            } => format!(
                "{} envies {}: on its top {} good(s) it gets {:.4} against {:.4}",
                agent(*envier),
                agent(*envied),
                prefix,
                envier_cumulative,
                envied_cumulative
            ),
            Counterexample::Manipulation {
                agent: a,
                false_ranking,
                prefix,
                ..
            } => {
                let ranking: Vec<String> = false_ranking.iter().map(|&g| good(g)).collect();
                format!(
                    "{} gains by reporting {} (strictly better on its top {} good(s))",
                    agent(*a),
                    ranking.join(" > "),
                    prefix
                )
            }
        }
    }
}

impl fmt::Display for Counterexample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.narrate(
            &|a: AgentId| format!("a{}", a + 1),
            &|g: GoodId| format!("g{}", g + 1),
        );
        f.write_str(&text)
    }
}
