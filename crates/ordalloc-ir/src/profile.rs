use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Index of an agent, `0..n`.
pub type AgentId = usize;
/// Index of a good, `0..n`.
pub type GoodId = usize;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Preference profile has no agents")]
    EmptyProfile,
    #[error("Agent {agent} ranks unknown good {good} (goods are 0..{num_goods})")]
    UnknownGood {
        agent: AgentId,
        good: GoodId,
        num_goods: usize,
    },
    #[error("Agent {agent} ranks good {good} more than once")]
    DuplicateGood { agent: AgentId, good: GoodId },
    #[error("Agent {agent} ranks only {ranked} of {expected} goods; good {good} is missing")]
    MissingGood {
        agent: AgentId,
        good: GoodId,
        ranked: usize,
        expected: usize,
    },
    #[error("Agent/good count mismatch: {agents} agents but {goods} goods")]
    CountMismatch { agents: usize, goods: usize },
    #[error("Unknown label `{0}`")]
    UnknownLabel(String),
    #[error("Label `{0}` is used more than once")]
    DuplicateLabel(String),
    #[error("Agent {0} does not exist in this profile")]
    UnknownAgent(AgentId),
}

/// Display names for agents and goods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labels {
    pub agents: Vec<String>,
    pub goods: Vec<String>,
}

impl Labels {
    /// Default labels `a1..an` and `g1..gn`.
    pub fn numbered(n: usize) -> Self {
        Self {
            agents: (1..=n).map(|i| format!("a{i}")).collect(),
            goods: (1..=n).map(|g| format!("g{g}")).collect(),
        }
    }
}

/// Strict rankings of every agent over every good.
///
/// Square by construction: `n` agents rank exactly `n` goods each. The profile
/// is immutable; [`PreferenceProfile::with_ranking`] produces a new profile
/// rather than editing this one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreferenceProfile {
    rankings: Vec<Vec<GoodId>>,
    /// `ranks[agent][good]` is the 0-based position of `good` in the agent's ranking.
    #[serde(skip)]
    ranks: Vec<Vec<usize>>,
    labels: Labels,
}

impl PreferenceProfile {
    /// Build a validated profile from index rankings, most preferred first.
    ///
    /// The number of goods is the number of agents; every ranking must be a
    /// permutation of `0..n`.
    pub fn new(rankings: Vec<Vec<GoodId>>) -> Result<Self, ValidationError> {
        let n = rankings.len();
        if n == 0 {
            return Err(ValidationError::EmptyProfile);
        }
        // Rankings that agree on a length other than `n` describe a
        // non-square problem rather than a malformed ranking.
        let lengths = rankings[0].len();
        if lengths != n && rankings.iter().all(|r| r.len() == lengths) {
            return Err(ValidationError::CountMismatch {
                agents: n,
                goods: lengths,
            });
        }
        let mut ranks = Vec::with_capacity(n);
        for (agent, ranking) in rankings.iter().enumerate() {
            ranks.push(validate_ranking(agent, ranking, n)?);
        }
        Ok(Self {
            rankings,
            ranks,
            labels: Labels::numbered(n),
        })
    }

    /// Build a profile from named agents and goods.
    ///
    /// `rankings[i]` is the ranking of `agents[i]`, given as good names.
    pub fn from_labelled<S: AsRef<str>>(
        agents: &[S],
        goods: &[S],
        rankings: &[Vec<S>],
    ) -> Result<Self, ValidationError> {
        if agents.len() != goods.len() {
            return Err(ValidationError::CountMismatch {
                agents: agents.len(),
                goods: goods.len(),
            });
        }
        if rankings.len() != agents.len() {
            return Err(ValidationError::CountMismatch {
                agents: rankings.len(),
                goods: goods.len(),
            });
        }
        let agent_index = label_index(agents)?;
        let good_index = label_index(goods)?;

        let mut indexed = Vec::with_capacity(rankings.len());
        for ranking in rankings {
            let mut row = Vec::with_capacity(ranking.len());
            for name in ranking {
                let good = good_index
                    .get(name.as_ref())
                    .copied()
                    .ok_or_else(|| ValidationError::UnknownLabel(name.as_ref().to_string()))?;
                row.push(good);
            }
            indexed.push(row);
        }

        let labels = Labels {
            agents: agent_index.into_keys().collect(),
            goods: good_index.into_keys().collect(),
        };
        Self::new(indexed)?.with_labels(labels)
    }

    /// Replace the display labels.
    pub fn with_labels(mut self, labels: Labels) -> Result<Self, ValidationError> {
        let n = self.num_agents();
        if labels.agents.len() != n || labels.goods.len() != n {
            return Err(ValidationError::CountMismatch {
                agents: labels.agents.len(),
                goods: labels.goods.len(),
            });
        }
        self.labels = labels;
        Ok(self)
    }

    /// A new profile in which `agent` reports `ranking` and everyone else is unchanged.
    pub fn with_ranking(
        &self,
        agent: AgentId,
        ranking: Vec<GoodId>,
    ) -> Result<Self, ValidationError> {
        if agent >= self.num_agents() {
            return Err(ValidationError::UnknownAgent(agent));
        }
        let agent_ranks = validate_ranking(agent, &ranking, self.num_goods())?;
        let mut next = self.clone();
        next.rankings[agent] = ranking;
        next.ranks[agent] = agent_ranks;
        Ok(next)
    }

    pub fn num_agents(&self) -> usize {
        self.rankings.len()
    }

    /// Always equal to [`Self::num_agents`].
    pub fn num_goods(&self) -> usize {
        self.rankings.len()
    }

    pub fn rankings(&self) -> &[Vec<GoodId>] {
        &self.rankings
    }

    /// Ranking of `agent`, most preferred good first.
    pub fn ranking(&self, agent: AgentId) -> &[GoodId] {
        &self.rankings[agent]
    }

    /// 0-based position of `good` in `agent`'s ranking.
    pub fn rank_of(&self, agent: AgentId, good: GoodId) -> usize {
        self.ranks[agent][good]
    }

    /// True if `agent` strictly prefers `a` to `b`.
    pub fn prefers(&self, agent: AgentId, a: GoodId, b: GoodId) -> bool {
        self.ranks[agent][a] < self.ranks[agent][b]
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn agent_label(&self, agent: AgentId) -> &str {
        &self.labels.agents[agent]
    }

    pub fn good_label(&self, good: GoodId) -> &str {
        &self.labels.goods[good]
    }
}

impl fmt::Display for PreferenceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (agent, ranking) in self.rankings.iter().enumerate() {
            let names: Vec<&str> = ranking.iter().map(|&g| self.good_label(g)).collect();
            writeln!(f, "{}: {}", self.agent_label(agent), names.join(" > "))?;
        }
        Ok(())
    }
}

fn validate_ranking(
    agent: AgentId,
    ranking: &[GoodId],
    num_goods: usize,
) -> Result<Vec<usize>, ValidationError> {
    const UNSEEN: usize = usize::MAX;
    let mut ranks = vec![UNSEEN; num_goods];
    for (position, &good) in ranking.iter().enumerate() {
        if good >= num_goods {
            return Err(ValidationError::UnknownGood {
                agent,
                good,
                num_goods,
            });
        }
        if ranks[good] != UNSEEN {
            return Err(ValidationError::DuplicateGood { agent, good });
        }
        ranks[good] = position;
    }
    if let Some(good) = ranks.iter().position(|&r| r == UNSEEN) {
        return Err(ValidationError::MissingGood {
            agent,
            good,
            ranked: ranking.len(),
            expected: num_goods,
        });
    }
    Ok(ranks)
}

fn label_index<S: AsRef<str>>(names: &[S]) -> Result<IndexMap<String, usize>, ValidationError> {
    let mut index = IndexMap::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        let name = name.as_ref().to_string();
        if index.contains_key(&name) {
            return Err(ValidationError::DuplicateLabel(name));
        }
        index.insert(name, i);
    }
    Ok(index)
}
