#![doc = include_str!("../README.md")]

//! Linear programs and their exact solution.
//!
//! [`program`] holds the solver-agnostic problem description; [`simplex`]
//! provides the exact two-phase simplex backend behind the [`LpSolver`]
//! interface. With the `z3` feature, `z3_backend` offers Z3 behind the same
//! interface.

pub mod program;
pub mod simplex;
#[cfg(feature = "z3")]
pub mod z3_backend;

pub use program::{Constraint, LinearProgram, Relation};
pub use simplex::{ExactSimplex, LpError, LpOutcome, LpSolver};
