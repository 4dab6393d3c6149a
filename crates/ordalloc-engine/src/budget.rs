//! Step and wall-clock accounting for exhaustive searches.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::warn;

use ordalloc_lp::{ExactSimplex, LinearProgram, LpError, LpOutcome, LpSolver};

use crate::config::SearchBudget;

/// Which limit of a [`SearchBudget`] was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "limit", rename_all = "snake_case")]
pub enum BudgetLimit {
    Steps { max_steps: u64 },
    WallClock { timeout_ms: u64 },
    Pivots { max_pivots: u64 },
}

impl fmt::Display for BudgetLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetLimit::Steps { max_steps } => write!(f, "step limit {max_steps}"),
            BudgetLimit::WallClock { timeout_ms } => write!(f, "timeout {timeout_ms} ms"),
            BudgetLimit::Pivots { max_pivots } => write!(f, "pivot limit {max_pivots}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Search budget exceeded after {steps} steps ({limit})")]
pub struct SearchBudgetExceeded {
    pub steps: u64,
    pub limit: BudgetLimit,
}

/// Running meter for one search, created from a [`SearchBudget`].
///
/// The deadline is fixed when the meter is started, so every check performed
/// under one meter shares one wall-clock allowance.
#[derive(Debug, Clone)]
pub struct BudgetMeter {
    steps: u64,
    max_steps: Option<u64>,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    max_pivots: Option<u64>,
}

impl BudgetMeter {
    pub fn start(budget: &SearchBudget) -> Self {
        Self {
            steps: 0,
            max_steps: budget.max_steps,
            timeout: budget.timeout,
            deadline: budget.timeout.and_then(|t| Instant::now().checked_add(t)),
            max_pivots: budget.max_pivots,
        }
    }

    pub fn unlimited() -> Self {
        Self::start(&SearchBudget::unlimited())
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Charge `cost` steps and fail if either limit is now exceeded.
    pub fn charge(&mut self, cost: u64) -> Result<(), SearchBudgetExceeded> {
        self.steps = self.steps.saturating_add(cost);
        if let Some(max_steps) = self.max_steps {
            if self.steps > max_steps {
                return Err(self.exceeded(BudgetLimit::Steps { max_steps }));
            }
        }
        if deadline_exceeded(self.deadline) {
            let timeout_ms = self
                .timeout
                .map_or(0, |t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX));
            return Err(self.exceeded(BudgetLimit::WallClock { timeout_ms }));
        }
        Ok(())
    }

    pub fn tick(&mut self) -> Result<(), SearchBudgetExceeded> {
        self.charge(1)
    }

    fn lp_solver(&self) -> ExactSimplex {
        let limit = self
            .max_pivots
            .map_or(usize::MAX, |p| usize::try_from(p).unwrap_or(usize::MAX));
        ExactSimplex::with_max_pivots(limit)
    }

    /// Solve `lp` under the pivot limit. Hitting the limit exhausts the
    /// budget; any other solver failure is returned as is.
    pub fn solve_lp(
        &self,
        lp: &LinearProgram,
    ) -> Result<Result<LpOutcome, LpError>, SearchBudgetExceeded> {
        match self.lp_solver().solve(lp) {
            Err(LpError::PivotLimit { limit }) => Err(self.exceeded(BudgetLimit::Pivots {
                max_pivots: u64::try_from(limit).unwrap_or(u64::MAX),
            })),
            other => Ok(other),
        }
    }

    fn exceeded(&self, limit: BudgetLimit) -> SearchBudgetExceeded {
        warn!(steps = self.steps, %limit, "Search budget exhausted");
        SearchBudgetExceeded {
            steps: self.steps,
            limit,
        }
    }
}

fn deadline_exceeded(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_limit_trips_after_max_steps() {
        let mut meter = BudgetMeter::start(&SearchBudget::with_max_steps(3));
        for _ in 0..3 {
            meter.tick().unwrap();
        }
        let err = meter.tick().unwrap_err();
        assert_eq!(err.steps, 4);
        assert_eq!(err.limit, BudgetLimit::Steps { max_steps: 3 });
    }

    #[test]
    fn expired_deadline_trips_immediately() {
        let budget = SearchBudget {
            timeout: Some(Duration::ZERO),
            ..SearchBudget::unlimited()
        };
        let mut meter = BudgetMeter::start(&budget);
        let err = meter.tick().unwrap_err();
        assert_eq!(err.limit, BudgetLimit::WallClock { timeout_ms: 0 });
    }

    #[test]
    fn unlimited_meter_never_trips() {
        let mut meter = BudgetMeter::unlimited();
        meter.charge(u64::MAX).unwrap();
        meter.tick().unwrap();
        assert_eq!(meter.steps(), u64::MAX);
    }

    #[test]
    fn pivot_limit_exhausts_the_budget() {
        use num::BigRational;
        use ordalloc_lp::Relation;

        let int = |v: i64| BigRational::from_integer(v.into());
        let mut lp = LinearProgram::maximize(vec![int(1), int(1)]);
        lp.add_constraint(vec![int(1), int(2)], Relation::Le, int(4));
        lp.add_constraint(vec![int(3), int(1)], Relation::Le, int(6));

        let budget = SearchBudget {
            max_pivots: Some(1),
            ..SearchBudget::unlimited()
        };
        let err = BudgetMeter::start(&budget).solve_lp(&lp).unwrap_err();
        assert_eq!(err.limit, BudgetLimit::Pivots { max_pivots: 1 });

        let solved = BudgetMeter::unlimited().solve_lp(&lp).unwrap().unwrap();
        assert!(solved.is_optimal());
    }

    #[test]
    fn error_message_names_the_limit() {
        let err = SearchBudgetExceeded {
            steps: 11,
            limit: BudgetLimit::Steps { max_steps: 10 },
        };
        assert_eq!(
            err.to_string(),
            "Search budget exceeded after 11 steps (step limit 10)"
        );
    }
}
