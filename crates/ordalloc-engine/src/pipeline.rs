//! Caller-facing entry points.
//!
//! These are thin wrappers that tie profile construction, the mechanism
//! registry and the verifier together under one [`EngineOptions`]. A UI or
//! CLI front end is expected to call only this module.

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

use ordalloc_ir::{Assignment, GoodId, PreferenceProfile, ValidationError};

use crate::config::EngineOptions;
use crate::mechanism::{
    Mechanism, MechanismError, MechanismKind, MechanismOutcome, UnknownMechanism,
};
use crate::result::VerificationReport;
use crate::verify::{PropertyVerifier, VerifyError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    UnknownMechanism(#[from] UnknownMechanism),
    #[error("Invalid profile: {0}")]
    Validation(#[from] ValidationError),
    #[error("Mechanism error: {0}")]
    Mechanism(#[from] MechanismError),
    #[error("Verification error: {0}")]
    Verify(#[from] VerifyError),
    #[error("Failed to serialize reproducibility payload: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

/// Build a profile from one ranking per agent, best good first.
pub fn build_profile(rankings: Vec<Vec<GoodId>>) -> Result<PreferenceProfile, ValidationError> {
    PreferenceProfile::new(rankings)
}

/// Run one of the built-in mechanisms.
pub fn run_mechanism(
    kind: MechanismKind,
    profile: &PreferenceProfile,
    options: &EngineOptions,
) -> Result<MechanismOutcome, MechanismError> {
    info!(mechanism = %kind, agents = profile.num_agents(), "Running mechanism");
    kind.build(options).assign(profile)
}

/// All four property reports for `assignment`. Strategy-proofness needs the
/// mechanism that produced the assignment and is undetermined without one.
pub fn verify(
    profile: &PreferenceProfile,
    assignment: &Assignment,
    mechanism: Option<&dyn Mechanism>,
    options: &EngineOptions,
) -> Result<Vec<VerificationReport>, VerifyError> {
    PropertyVerifier::new(*options).verify_all(profile, assignment, mechanism)
}

/// A mechanism run plus the verdicts on its output.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub outcome: MechanismOutcome,
    /// One report per property, in [`crate::result::Property::ALL`] order.
    pub reports: Vec<VerificationReport>,
    /// SHA-256 over the profile, the options, the mechanism and the engine
    /// version. Equal fingerprints mean the evaluation is reproducible.
    pub fingerprint: String,
}

impl Evaluation {
    /// True if every property holds.
    pub fn all_hold(&self) -> bool {
        self.reports.iter().all(VerificationReport::is_holds)
    }

    /// True if any property fails with a counterexample.
    pub fn any_fail(&self) -> bool {
        self.reports.iter().any(VerificationReport::is_fails)
    }

    /// Overall summary: "holds", "fails", or "undetermined".
    pub fn overall_verdict(&self) -> &'static str {
        if self.any_fail() {
            "fails"
        } else if self.all_hold() {
            "holds"
        } else {
            "undetermined"
        }
    }
}

/// Run `kind` on `profile` and check all four properties of the result.
pub fn evaluate_mechanism(
    kind: MechanismKind,
    profile: &PreferenceProfile,
    options: &EngineOptions,
) -> Result<Evaluation, PipelineError> {
    let fingerprint = reproducibility_fingerprint(kind, profile, options)?;
    let mechanism = kind.build(options);
    info!(mechanism = %kind, agents = profile.num_agents(), "Evaluating mechanism");
    let outcome = mechanism.assign(profile)?;
    let reports = PropertyVerifier::new(*options).verify_all(
        profile,
        &outcome.assignment,
        Some(mechanism.as_ref()),
    )?;
    let evaluation = Evaluation {
        outcome,
        reports,
        fingerprint,
    };
    info!(
        mechanism = %kind,
        verdict = evaluation.overall_verdict(),
        "Evaluation finished"
    );
    Ok(evaluation)
}

fn reproducibility_fingerprint(
    kind: MechanismKind,
    profile: &PreferenceProfile,
    options: &EngineOptions,
) -> Result<String, PipelineError> {
    let payload = serde_json::json!({
        "engine_version": env!("CARGO_PKG_VERSION"),
        "mechanism": kind.display_name(),
        "options": options,
        "profile": profile,
    });
    let serialized = serde_json::to_vec(&payload)?;
    Ok(Sha256::digest(&serialized)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{Property, Verdict};

    fn three_agents() -> PreferenceProfile {
        build_profile(vec![vec![0, 1, 2], vec![0, 1, 2], vec![1, 0, 2]]).unwrap()
    }

    #[test]
    fn build_profile_rejects_bad_rankings() {
        assert!(build_profile(vec![vec![0, 0], vec![0, 1]]).is_err());
        assert_eq!(
            build_profile(vec![vec![0, 1, 2], vec![0, 1, 2]]).unwrap_err(),
            ValidationError::CountMismatch {
                agents: 2,
                goods: 3
            }
        );
    }

    #[test]
    fn unknown_mechanism_name_is_a_pipeline_error() {
        let err: PipelineError = "lottery"
            .parse::<MechanismKind>()
            .map_err(PipelineError::from)
            .unwrap_err();
        assert!(err.to_string().contains("lottery"));
    }

    #[test]
    fn run_mechanism_labels_its_outcome() {
        let outcome = run_mechanism(
            MechanismKind::ProbabilisticSerial,
            &three_agents(),
            &EngineOptions::default(),
        )
        .unwrap();
        assert_eq!(outcome.mechanism, "Probabilistic Serial");
        assert!(outcome.exactness.is_exact());
    }

    #[test]
    fn verify_without_mechanism_leaves_incentives_undetermined() {
        let p = three_agents();
        let options = EngineOptions::default();
        let outcome = run_mechanism(MechanismKind::RandomPriority, &p, &options).unwrap();
        let reports = verify(&p, &outcome.assignment, None, &options).unwrap();
        let properties: Vec<Property> = reports.iter().map(|r| r.property).collect();
        assert_eq!(properties, Property::ALL.to_vec());
        assert!(matches!(reports[3].verdict, Verdict::Undetermined { .. }));
    }

    #[test]
    fn probabilistic_serial_is_efficient_and_envy_free() {
        let evaluation = evaluate_mechanism(
            MechanismKind::ProbabilisticSerial,
            &three_agents(),
            &EngineOptions::default(),
        )
        .unwrap();
        assert!(evaluation.reports[..3].iter().all(|r| r.is_holds()));
        assert_eq!(evaluation.fingerprint.len(), 64);
    }

    #[test]
    fn fingerprint_tracks_inputs() {
        let p = three_agents();
        let options = EngineOptions::default();
        let a = reproducibility_fingerprint(MechanismKind::RandomPriority, &p, &options).unwrap();
        let b = reproducibility_fingerprint(MechanismKind::RandomPriority, &p, &options).unwrap();
        let c = reproducibility_fingerprint(MechanismKind::PopularAssignment, &p, &options)
            .unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn popular_evaluation_reports_envy() {
        let evaluation = evaluate_mechanism(
            MechanismKind::PopularAssignment,
            &three_agents(),
            &EngineOptions::default(),
        )
        .unwrap();
        assert!(evaluation.any_fail());
        assert_eq!(evaluation.overall_verdict(), "fails");
        assert!(evaluation.reports[2].is_fails());
    }
}
