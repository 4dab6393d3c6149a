//! Randomized assignment mechanisms.
//!
//! A [`Mechanism`] maps a [`PreferenceProfile`] to a doubly-stochastic
//! [`Assignment`]. The three built-in mechanisms are selected through
//! [`MechanismKind`]; callers may implement the trait themselves to have their
//! own rules checked by the verifier.

pub mod popular;
pub mod probabilistic_serial;
pub mod random_priority;

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use ordalloc_ir::{Assignment, AssignmentError, PreferenceProfile};
use ordalloc_lp::LpError;
use ordalloc_prob::RationalError;

use crate::config::EngineOptions;

pub use popular::PopularAssignment;
pub use probabilistic_serial::ProbabilisticSerial;
pub use random_priority::RandomPriority;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MechanismError {
    #[error(
        "No popular assignment exists: the best assignment found loses a majority vote by {best_margin}"
    )]
    NoPopularAssignmentExists {
        best_margin: f64,
        partial: Option<Assignment>,
    },
    #[error("Cutting-plane search did not converge within {max_rounds} rounds")]
    RoundLimit { max_rounds: usize },
    #[error("Cutting-plane solver failed: {detail}")]
    SolverFailure { detail: &'static str },
    #[error("Mechanism produced an invalid assignment: {0}")]
    Assignment(#[from] AssignmentError),
    #[error("LP error: {0}")]
    Lp(#[from] LpError),
    #[error("Rational conversion error: {0}")]
    Rational(#[from] RationalError),
}

/// Whether an outcome is exact or a Monte Carlo estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Exactness {
    Exact,
    /// Estimated from `trials` priority orders drawn with `seed`.
    Sampled { trials: u64, seed: u64 },
}

impl Exactness {
    pub fn is_exact(&self) -> bool {
        matches!(self, Exactness::Exact)
    }
}

impl fmt::Display for Exactness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exactness::Exact => write!(f, "exact"),
            Exactness::Sampled { trials, seed } => {
                write!(f, "approximate ({trials} sampled orders, seed {seed})")
            }
        }
    }
}

/// An assignment together with the mechanism that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MechanismOutcome {
    pub mechanism: String,
    pub assignment: Assignment,
    pub exactness: Exactness,
}

impl MechanismOutcome {
    pub fn exact(mechanism: &str, assignment: Assignment) -> Self {
        Self {
            mechanism: mechanism.to_string(),
            assignment,
            exactness: Exactness::Exact,
        }
    }
}

/// A rule turning reported preferences into a random assignment.
///
/// Implementations must be deterministic: equal profiles give equal outcomes.
pub trait Mechanism {
    fn name(&self) -> &str;

    fn assign(&self, profile: &PreferenceProfile) -> Result<MechanismOutcome, MechanismError>;
}

/// The built-in mechanisms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MechanismKind {
    RandomPriority,
    ProbabilisticSerial,
    PopularAssignment,
}

impl MechanismKind {
    pub const ALL: [MechanismKind; 3] = [
        MechanismKind::RandomPriority,
        MechanismKind::ProbabilisticSerial,
        MechanismKind::PopularAssignment,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            MechanismKind::RandomPriority => "Random Priority",
            MechanismKind::ProbabilisticSerial => "Probabilistic Serial",
            MechanismKind::PopularAssignment => "Popular",
        }
    }

    /// Instantiate the mechanism with its slice of `options`.
    pub fn build(&self, options: &EngineOptions) -> Box<dyn Mechanism> {
        match self {
            MechanismKind::RandomPriority => Box::new(RandomPriority::new(
                options.random_priority,
                options.tolerance,
            )),
            MechanismKind::ProbabilisticSerial => {
                Box::new(ProbabilisticSerial::new(options.tolerance))
            }
            MechanismKind::PopularAssignment => {
                Box::new(PopularAssignment::new(options.popular, options.tolerance))
            }
        }
    }
}

impl fmt::Display for MechanismKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown mechanism `{0}` (expected Random Priority, Probabilistic Serial or Popular)")]
pub struct UnknownMechanism(pub String);

impl FromStr for MechanismKind {
    type Err = UnknownMechanism;

    /// Accepts display names and kebab/snake-case identifiers, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(*c, ' ' | '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "randompriority" | "rp" => Ok(MechanismKind::RandomPriority),
            "probabilisticserial" | "ps" => Ok(MechanismKind::ProbabilisticSerial),
            "popular" | "popularassignment" => Ok(MechanismKind::PopularAssignment),
            _ => Err(UnknownMechanism(s.to_string())),
        }
    }
}
