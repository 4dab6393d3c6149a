//! Property verification.
//!
//! [`PropertyVerifier`] checks an assignment against ex-post efficiency,
//! ordinal efficiency and envy-freeness, and a mechanism against
//! strategy-proofness. Every check is a pure function of its inputs and ends
//! in one of three verdicts: the property holds, it fails with a concrete
//! counterexample, or it is undetermined because its [`SearchBudget`] ran
//! out.
//!
//! [`SearchBudget`]: crate::config::SearchBudget

pub mod envy;
pub mod ex_post;
pub mod ordinal;
pub mod strategy;

use thiserror::Error;
use tracing::info;

use ordalloc_ir::{Assignment, AssignmentError, PreferenceProfile, ValidationError};
use ordalloc_lp::LpError;
use ordalloc_prob::{Decomposition, DecompositionError, RationalError};

use crate::budget::{BudgetMeter, SearchBudgetExceeded};
use crate::config::EngineOptions;
use crate::mechanism::{Mechanism, MechanismError};
use crate::result::{Property, Verdict, VerificationReport};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VerifyError {
    #[error("Profile has {profile} agents but the assignment is {assignment}x{assignment}")]
    SizeMismatch { profile: usize, assignment: usize },
    #[error("Assignment error: {0}")]
    Assignment(#[from] AssignmentError),
    #[error("Decomposition error: {0}")]
    Decomposition(#[from] DecompositionError),
    #[error("Decomposition does not describe the assignment (error {error:e}, allowed {bound:e})")]
    ForeignDecomposition { error: f64, bound: f64 },
    #[error("Mechanism error: {0}")]
    Mechanism(#[from] MechanismError),
    #[error("Invalid misreport: {0}")]
    Profile(#[from] ValidationError),
    #[error("LP error: {0}")]
    Lp(#[from] LpError),
    #[error("Rational conversion error: {0}")]
    Rational(#[from] RationalError),
    #[error(transparent)]
    Budget(#[from] SearchBudgetExceeded),
}

/// A finished check: the verdict plus an optional scope note.
#[derive(Debug)]
pub(crate) struct Checked {
    verdict: Verdict,
    note: Option<String>,
}

impl Checked {
    fn verdict(verdict: Verdict) -> Self {
        Self {
            verdict,
            note: None,
        }
    }

    fn with_note(verdict: Verdict, note: impl Into<String>) -> Self {
        Self {
            verdict,
            note: Some(note.into()),
        }
    }
}

/// Checks the four properties under one [`EngineOptions`].
#[derive(Debug, Clone, Default)]
pub struct PropertyVerifier {
    options: EngineOptions,
}

impl PropertyVerifier {
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Whether the assignment is a lottery over Pareto-optimal matchings.
    pub fn ex_post_efficiency(
        &self,
        profile: &PreferenceProfile,
        assignment: &Assignment,
    ) -> Result<VerificationReport, VerifyError> {
        check_sizes(profile, assignment)?;
        let mut meter = BudgetMeter::start(&self.options.budget);
        let result = ex_post::check(profile, assignment, None, &self.options, &mut meter);
        finish(Property::ExPostEfficiency, result)
    }

    /// Like [`Self::ex_post_efficiency`], reusing an existing decomposition
    /// of `assignment`. A decomposition that does not reconstruct
    /// `assignment` is rejected with [`VerifyError::ForeignDecomposition`].
    pub fn ex_post_efficiency_with(
        &self,
        profile: &PreferenceProfile,
        assignment: &Assignment,
        decomposition: &Decomposition,
    ) -> Result<VerificationReport, VerifyError> {
        check_sizes(profile, assignment)?;
        let mut meter = BudgetMeter::start(&self.options.budget);
        let result = ex_post::check(
            profile,
            assignment,
            Some(decomposition),
            &self.options,
            &mut meter,
        );
        finish(Property::ExPostEfficiency, result)
    }

    /// Whether no other assignment stochastically dominates this one for
    /// every agent.
    pub fn ordinal_efficiency(
        &self,
        profile: &PreferenceProfile,
        assignment: &Assignment,
    ) -> Result<VerificationReport, VerifyError> {
        check_sizes(profile, assignment)?;
        let mut meter = BudgetMeter::start(&self.options.budget);
        let result = ordinal::check(profile, assignment, &self.options.tolerance, &mut meter);
        finish(Property::OrdinalEfficiency, result)
    }

    /// Whether no agent prefers another agent's lottery to its own.
    pub fn no_envy(
        &self,
        profile: &PreferenceProfile,
        assignment: &Assignment,
    ) -> Result<VerificationReport, VerifyError> {
        check_sizes(profile, assignment)?;
        let result = Ok(envy::check(profile, assignment, &self.options.tolerance));
        finish(Property::NoEnvy, result)
    }

    /// Whether any agent can obtain a dominating lottery by misreporting.
    pub fn strategy_proofness(
        &self,
        profile: &PreferenceProfile,
        mechanism: &dyn Mechanism,
    ) -> Result<VerificationReport, VerifyError> {
        let mut meter = BudgetMeter::start(&self.options.budget);
        let result = strategy::check(profile, mechanism, &self.options, &mut meter);
        finish(Property::StrategyProofness, result)
    }

    /// All four checks in [`Property::ALL`] order. Without a mechanism the
    /// strategy-proofness report is undetermined.
    pub fn verify_all(
        &self,
        profile: &PreferenceProfile,
        assignment: &Assignment,
        mechanism: Option<&dyn Mechanism>,
    ) -> Result<Vec<VerificationReport>, VerifyError> {
        let mut reports = vec![
            self.ex_post_efficiency(profile, assignment)?,
            self.ordinal_efficiency(profile, assignment)?,
            self.no_envy(profile, assignment)?,
        ];
        reports.push(match mechanism {
            Some(m) => self.strategy_proofness(profile, m)?,
            None => VerificationReport::undetermined(
                Property::StrategyProofness,
                "no mechanism supplied",
            ),
        });
        Ok(reports)
    }
}

fn check_sizes(profile: &PreferenceProfile, assignment: &Assignment) -> Result<(), VerifyError> {
    if profile.num_agents() != assignment.n() {
        return Err(VerifyError::SizeMismatch {
            profile: profile.num_agents(),
            assignment: assignment.n(),
        });
    }
    Ok(())
}

/// Turn a check result into a report. Budget exhaustion becomes an
/// undetermined verdict; every other error is returned to the caller.
fn finish(
    property: Property,
    result: Result<Checked, VerifyError>,
) -> Result<VerificationReport, VerifyError> {
    let report = match result {
        Ok(Checked { verdict, note }) => VerificationReport {
            property,
            verdict,
            note,
        },
        Err(VerifyError::Budget(exceeded)) => {
            VerificationReport::undetermined(property, exceeded.to_string())
        }
        Err(e) => return Err(e),
    };
    info!(property = %property, verdict = report.verdict_class(), "Property checked");
    Ok(report)
}
