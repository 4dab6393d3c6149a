#![doc = include_str!("../README.md")]

//! Ordalloc intermediate representation.
//!
//! This crate defines preference profiles, doubly-stochastic assignments,
//! permutation assignments, first-order stochastic dominance, permutation
//! enumeration and bipartite matching. Everything here is immutable once
//! constructed and free of I/O.

pub mod assignment;
pub mod dominance;
pub mod matching;
pub mod permutation;
pub mod profile;
#[cfg(any(test, feature = "proptest"))]
pub mod proptest_generators;

pub use assignment::{Assignment, AssignmentError, PermutationAssignment, Tolerance};
pub use dominance::SdRelation;
pub use profile::{AgentId, GoodId, Labels, PreferenceProfile, ValidationError};
