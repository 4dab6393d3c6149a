use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::profile::{AgentId, GoodId, Labels};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssignmentError {
    #[error("Assignment matrix is empty")]
    Empty,
    #[error("Assignment matrix is not square: row {row} has {found} entries, expected {expected}")]
    NotSquare {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Invalid probability {value} for agent {agent}, good {good}")]
    InvalidEntry {
        agent: AgentId,
        good: GoodId,
        value: f64,
    },
    #[error("Row of agent {agent} sums to {sum}, expected 1")]
    RowSum { agent: AgentId, sum: f64 },
    #[error("Column of good {good} sums to {sum}, expected 1")]
    ColumnSum { good: GoodId, sum: f64 },
    #[error("{0:?} is not a permutation of 0..{1}")]
    NotAPermutation(Vec<GoodId>, usize),
}

/// Numeric tolerances shared by every component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerance {
    /// Allowed deviation of row/column sums (and of reconstructed matrices) from exact values.
    pub epsilon: f64,
    /// Entries at or below this value are treated as zero probability.
    pub support_threshold: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            epsilon: 1e-6,
            support_threshold: 1e-9,
        }
    }
}

impl Tolerance {
    /// True if `value` counts as positive probability mass.
    pub fn is_positive(&self, value: f64) -> bool {
        value > self.support_threshold
    }
}

/// A doubly-stochastic matrix: `probs[agent][good]` is the probability that
/// `agent` receives `good`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    probs: Vec<Vec<f64>>,
}

impl Assignment {
    /// Validate `probs` as a doubly-stochastic matrix within `tolerance.epsilon`.
    ///
    /// Entries within epsilon outside `[0, 1]` are clamped; anything further
    /// out (or NaN) is rejected.
    pub fn new(mut probs: Vec<Vec<f64>>, tolerance: &Tolerance) -> Result<Self, AssignmentError> {
        let n = probs.len();
        if n == 0 {
            return Err(AssignmentError::Empty);
        }
        for (agent, row) in probs.iter_mut().enumerate() {
            if row.len() != n {
                return Err(AssignmentError::NotSquare {
                    row: agent,
                    expected: n,
                    found: row.len(),
                });
            }
            for (good, value) in row.iter_mut().enumerate() {
                if !value.is_finite()
                    || *value < -tolerance.epsilon
                    || *value > 1.0 + tolerance.epsilon
                {
                    return Err(AssignmentError::InvalidEntry {
                        agent,
                        good,
                        value: *value,
                    });
                }
                *value = value.clamp(0.0, 1.0);
            }
        }
        for (agent, row) in probs.iter().enumerate() {
            let sum: f64 = row.iter().sum();
            if (sum - 1.0).abs() > tolerance.epsilon {
                return Err(AssignmentError::RowSum { agent, sum });
            }
        }
        for good in 0..n {
            let sum: f64 = probs.iter().map(|row| row[good]).sum();
            if (sum - 1.0).abs() > tolerance.epsilon {
                return Err(AssignmentError::ColumnSum { good, sum });
            }
        }
        Ok(Self { probs })
    }

    pub fn n(&self) -> usize {
        self.probs.len()
    }

    pub fn get(&self, agent: AgentId, good: GoodId) -> f64 {
        self.probs[agent][good]
    }

    /// Lottery of `agent` over goods, indexed by good.
    pub fn row(&self, agent: AgentId) -> &[f64] {
        &self.probs[agent]
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.probs
    }

    pub fn into_rows(self) -> Vec<Vec<f64>> {
        self.probs
    }

    /// Largest absolute entrywise difference to `other` (`f64::INFINITY` on size mismatch).
    pub fn max_abs_diff(&self, other: &Assignment) -> f64 {
        if self.n() != other.n() {
            return f64::INFINITY;
        }
        self.probs
            .iter()
            .zip(&other.probs)
            .flat_map(|(a, b)| a.iter().zip(b).map(|(x, y)| (x - y).abs()))
            .fold(0.0, f64::max)
    }

    /// One-line summary of what `agent` receives, e.g. `a1 receives 50.00% of g1, 50.00% of g3`.
    ///
    /// Goods with zero probability are omitted.
    pub fn describe_agent(&self, agent: AgentId, labels: &Labels) -> String {
        let parts: Vec<String> = self.probs[agent]
            .iter()
            .enumerate()
            .filter(|(_, p)| **p > 0.0)
            .map(|(good, &p)| format!("{:.2}% of {}", p * 100.0, labels.goods[good]))
            .collect();
        if parts.is_empty() {
            format!("{} receives nothing", labels.agents[agent])
        } else {
            format!("{} receives {}", labels.agents[agent], parts.join(", "))
        }
    }

    /// Percentage table using `labels`.
    pub fn table<'a>(&'a self, labels: &'a Labels) -> AssignmentTable<'a> {
        AssignmentTable {
            assignment: self,
            labels,
        }
    }
}

/// Renders an [`Assignment`] as a percentage table with agent and good names.
pub struct AssignmentTable<'a> {
    assignment: &'a Assignment,
    labels: &'a Labels,
}

impl fmt::Display for AssignmentTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .labels
            .agents
            .iter()
            .map(String::len)
            .max()
            .unwrap_or(0);
        write!(f, "{:width$}", "")?;
        for good in &self.labels.goods {
            write!(f, " {good:>8}")?;
        }
        writeln!(f)?;
        for (agent, row) in self.assignment.probs.iter().enumerate() {
            write!(f, "{:width$}", self.labels.agents[agent])?;
            for p in row {
                write!(f, " {:>7.2}%", p * 100.0)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels = Labels::numbered(self.n());
        write!(f, "{}", self.table(&labels))
    }
}

/// A deterministic matching: agent `i` receives `goods[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermutationAssignment {
    goods: Vec<GoodId>,
}

impl PermutationAssignment {
    pub fn new(goods: Vec<GoodId>) -> Result<Self, AssignmentError> {
        let n = goods.len();
        let mut seen = vec![false; n];
        let valid = goods
            .iter()
            .all(|&g| g < n && !std::mem::replace(&mut seen[g], true));
        if !valid {
            return Err(AssignmentError::NotAPermutation(goods, n));
        }
        Ok(Self { goods })
    }

    pub fn identity(n: usize) -> Self {
        Self {
            goods: (0..n).collect(),
        }
    }

    pub fn n(&self) -> usize {
        self.goods.len()
    }

    pub fn good_of(&self, agent: AgentId) -> GoodId {
        self.goods[agent]
    }

    pub fn goods(&self) -> &[GoodId] {
        &self.goods
    }

    /// The 0/1 matrix of this matching.
    pub fn to_assignment(&self) -> Assignment {
        let n = self.n();
        let probs = self
            .goods
            .iter()
            .map(|&g| {
                let mut row = vec![0.0; n];
                row[g] = 1.0;
                row
            })
            .collect();
        Assignment { probs }
    }
}

impl fmt::Display for PermutationAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self
            .goods
            .iter()
            .enumerate()
            .map(|(agent, good)| format!("{agent}->{good}"))
            .collect();
        write!(f, "[{}]", pairs.join(", "))
    }
}
