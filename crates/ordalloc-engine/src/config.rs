//! Engine configuration.
//!
//! Every knob is an explicit value handed to the component that needs it.
//! [`EngineOptions`] bundles them for the pipeline and deserializes from JSON
//! with defaults for any missing field.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use ordalloc_ir::Tolerance;

/// Options for the Random Priority mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomPriorityOptions {
    /// Largest `n` for which all `n!` priority orders are enumerated.
    pub exact_threshold: usize,
    /// Number of sampled priority orders above the threshold.
    pub sampling_trials: u64,
    /// Seed of the sampling RNG.
    pub seed: u64,
}

impl Default for RandomPriorityOptions {
    fn default() -> Self {
        Self {
            exact_threshold: 8,
            sampling_trials: 10_000,
            seed: 0,
        }
    }
}

/// Options for the popular-assignment mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopularOptions {
    /// Maximum number of cutting-plane rounds.
    pub max_rounds: usize,
    /// Pivot limit for each LP solve.
    pub max_pivots: usize,
}

impl Default for PopularOptions {
    fn default() -> Self {
        Self {
            max_rounds: 256,
            max_pivots: 200_000,
        }
    }
}

/// Work limit for exhaustive searches.
///
/// One step is one candidate examined: a permutation compared, a misreport
/// evaluated, or a graph node expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchBudget {
    pub max_steps: Option<u64>,
    pub timeout: Option<Duration>,
    /// Pivot limit for each exact LP solved while verifying.
    pub max_pivots: Option<u64>,
}

impl Default for SearchBudget {
    fn default() -> Self {
        Self {
            max_steps: Some(5_000_000),
            timeout: None,
            max_pivots: Some(200_000),
        }
    }
}

impl SearchBudget {
    pub fn unlimited() -> Self {
        Self {
            max_steps: None,
            timeout: None,
            max_pivots: None,
        }
    }

    pub fn with_max_steps(max_steps: u64) -> Self {
        Self {
            max_steps: Some(max_steps),
            ..Self::default()
        }
    }
}

/// Which false rankings the strategy-proofness check tries for each agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum MisreportScope {
    /// All `n! - 1` rankings other than the truth.
    Exhaustive,
    /// The `n - 1` rankings that swap one adjacent pair of the truth.
    AdjacentSwaps,
    /// Exhaustive for `n <= exhaustive_up_to`, adjacent swaps above.
    Auto { exhaustive_up_to: usize },
}

impl Default for MisreportScope {
    fn default() -> Self {
        MisreportScope::Auto {
            exhaustive_up_to: 6,
        }
    }
}

impl MisreportScope {
    /// True if every alternative ranking is tried for profiles of size `n`.
    pub fn is_exhaustive_for(&self, n: usize) -> bool {
        match self {
            MisreportScope::Exhaustive => true,
            MisreportScope::AdjacentSwaps => n <= 2,
            MisreportScope::Auto { exhaustive_up_to } => n <= *exhaustive_up_to || n <= 2,
        }
    }
}

/// Everything the mechanisms and the verifier can be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub tolerance: Tolerance,
    pub random_priority: RandomPriorityOptions,
    pub popular: PopularOptions,
    pub budget: SearchBudget,
    pub misreports: MisreportScope,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_documented_values() {
        let options = EngineOptions::default();
        assert_eq!(options.tolerance.epsilon, 1e-6);
        assert_eq!(options.random_priority.exact_threshold, 8);
        assert_eq!(options.random_priority.sampling_trials, 10_000);
        assert_eq!(options.popular.max_rounds, 256);
        assert_eq!(options.budget.max_steps, Some(5_000_000));
        assert_eq!(options.budget.timeout, None);
        assert_eq!(options.budget.max_pivots, Some(200_000));
        assert_eq!(
            options.misreports,
            MisreportScope::Auto {
                exhaustive_up_to: 6
            }
        );
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let options: EngineOptions = serde_json::from_str(
            r#"{"random_priority": {"seed": 42}, "misreports": {"scope": "adjacent_swaps"}}"#,
        )
        .unwrap();
        assert_eq!(options.random_priority.seed, 42);
        assert_eq!(options.random_priority.exact_threshold, 8);
        assert_eq!(options.misreports, MisreportScope::AdjacentSwaps);
        assert_eq!(options.popular, PopularOptions::default());
    }

    #[test]
    fn adjacent_swaps_cover_everything_for_two_goods() {
        assert!(MisreportScope::AdjacentSwaps.is_exhaustive_for(2));
        assert!(!MisreportScope::AdjacentSwaps.is_exhaustive_for(3));
        assert!(MisreportScope::default().is_exhaustive_for(6));
        assert!(!MisreportScope::default().is_exhaustive_for(7));
    }
}
