#![doc = include_str!("../README.md")]

//! Ordalloc engine.
//!
//! This crate holds the randomized assignment mechanisms (Random Priority,
//! Probabilistic Serial, Popular), the property verifier with its reports and
//! counterexamples, search budgets, and the caller-facing pipeline.

pub mod budget;
pub mod config;
pub mod counterexample;
pub mod mechanism;
pub mod pipeline;
pub mod result;
pub mod verify;

pub use config::{EngineOptions, MisreportScope, SearchBudget};
pub use counterexample::Counterexample;
pub use mechanism::{Mechanism, MechanismError, MechanismKind, MechanismOutcome};
pub use pipeline::{
    build_profile, evaluate_mechanism, run_mechanism, verify, Evaluation, PipelineError,
};
pub use result::{Property, Verdict, VerificationReport};
pub use verify::{PropertyVerifier, VerifyError};
